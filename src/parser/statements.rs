//! Statement parsing implementation
//!
//! Struct bodies and function bodies share one statement grammar; which
//! statements are legal where is checked by the validator.
//!
//! - Variable declarations: `u32 x;`, `Header h @ 0x10;`, `u32 x = 5;`
//! - Control flow: `if`/`else`, `while`
//! - `return`
//! - Assignments: `x = expr;`
//! - Expression statements: function calls
//!
//! # Grammar
//!
//! ```text
//! statement ::= variable | if_stmt | while_stmt | return_stmt
//!             | ident "=" expr ";" | expr ";"
//! body      ::= "{" statement* "}" | statement
//! ```
//!
//! All parsing methods are implemented as `pub(crate)` methods on the [`Parser`] struct.

use crate::parser::ast::*;
use crate::parser::lexer::Token;
use crate::parser::parse::{ParseError, Parser};

impl Parser {
    /// Parse block statements (inside braces, excluding the braces themselves)
    pub(crate) fn parse_block_statements(&mut self) -> Result<Vec<AstNode>, ParseError> {
        let mut statements = Vec::new();

        while !self.check(&Token::RBrace(self.current_location())) && !self.is_at_end() {
            statements.push(self.parse_statement()?);
        }

        Ok(statements)
    }

    /// Parse a statement
    pub(crate) fn parse_statement(&mut self) -> Result<AstNode, ParseError> {
        let loc = self.current_location();

        if self.match_token(&Token::Return(loc)) {
            return self.parse_return_statement();
        }

        if self.match_token(&Token::If(loc)) {
            return self.parse_if_statement();
        }

        if self.match_token(&Token::While(loc)) {
            return self.parse_while_statement();
        }

        if self.is_type_start() || self.looks_like_declaration() {
            return self.parse_variable_declaration();
        }

        if let Token::Ident(name, _) = self.peek_token() {
            if self.check_ahead(1, &Token::Eq(loc)) {
                self.advance(); // name
                self.advance(); // '='
                let rhs = Box::new(self.parse_expression()?);
                self.expect_semicolon("after assignment")?;
                return Ok(AstNode::Assignment {
                    name,
                    rhs,
                    location: loc,
                });
            }
        }

        let expr = self.parse_expression()?;
        self.expect_semicolon("after expression")?;
        Ok(AstNode::ExpressionStatement {
            expr: Box::new(expr),
            location: loc,
        })
    }

    /// Whether the tokens ahead read as `Path name` or `Path *name :`
    fn looks_like_declaration(&self) -> bool {
        if !matches!(self.peek(), Token::Ident(..)) {
            return false;
        }

        let mut n = 1;
        while matches!(self.peek_ahead(n), Some(Token::ColonColon(_)))
            && matches!(self.peek_ahead(n + 1), Some(Token::Ident(..)))
        {
            n += 2;
        }

        match self.peek_ahead(n) {
            Some(Token::Ident(..)) => true,
            Some(Token::Star(_)) => {
                matches!(self.peek_ahead(n + 1), Some(Token::Ident(..)))
                    && matches!(self.peek_ahead(n + 2), Some(Token::Colon(_)))
            }
            _ => false,
        }
    }

    /// Parse `{ statements }` or a single statement
    fn parse_body(&mut self, ctx: &str) -> Result<Vec<AstNode>, ParseError> {
        if self.match_token(&Token::LBrace(self.current_location())) {
            let statements = self.parse_block_statements()?;
            self.expect_rbrace(ctx)?;
            Ok(statements)
        } else {
            Ok(vec![self.parse_statement()?])
        }
    }

    /// Parse return statement: return [expr];
    fn parse_return_statement(&mut self) -> Result<AstNode, ParseError> {
        let loc = self.previous_location();

        let expr = if self.check(&Token::Semicolon(self.current_location())) {
            None
        } else {
            Some(Box::new(self.parse_expression()?))
        };

        self.expect_semicolon("after return")?;

        Ok(AstNode::Return { expr, location: loc })
    }

    /// Parse if statement: if (condition) body [else body]
    fn parse_if_statement(&mut self) -> Result<AstNode, ParseError> {
        let loc = self.previous_location();

        self.expect_lparen("after 'if'")?;
        let condition = Box::new(self.parse_expression()?);
        self.expect_rparen("after if condition")?;

        let then_branch = self.parse_body("after if body")?;

        let else_branch = if self.match_token(&Token::Else(self.current_location())) {
            Some(self.parse_body("after else body")?)
        } else {
            None
        };

        Ok(AstNode::If {
            condition,
            then_branch,
            else_branch,
            location: loc,
        })
    }

    /// Parse while statement: while (condition) body
    fn parse_while_statement(&mut self) -> Result<AstNode, ParseError> {
        let loc = self.previous_location();

        self.expect_lparen("after 'while'")?;
        let condition = Box::new(self.parse_expression()?);
        self.expect_rparen("after while condition")?;

        let body = self.parse_body("after while body")?;

        Ok(AstNode::While {
            condition,
            body,
            location: loc,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::parser::ast::*;
    use crate::parser::parse::Parser;

    fn parse(source: &str) -> Vec<AstNode> {
        Parser::new(source).unwrap().parse_program().unwrap().nodes
    }

    #[test]
    fn test_struct_with_conditional_members() {
        let nodes = parse(
            r#"
            struct Packet {
                u8 kind;
                if (kind == 1) {
                    u32 payload;
                } else
                    u16 short_payload;
                std::print("done");
            };
            "#,
        );

        match &nodes[0] {
            AstNode::StructDef { members, .. } => {
                assert_eq!(members.len(), 3);
                match &members[1] {
                    AstNode::If {
                        then_branch,
                        else_branch,
                        ..
                    } => {
                        assert_eq!(then_branch.len(), 1);
                        assert_eq!(else_branch.as_ref().map(Vec::len), Some(1));
                    }
                    other => panic!("Expected if, got {:?}", other),
                }
                assert!(matches!(&members[2], AstNode::ExpressionStatement { .. }));
            }
            other => panic!("Expected struct, got {:?}", other),
        }
    }

    #[test]
    fn test_function_body_statements() {
        let nodes = parse(
            r#"
            fn count(limit) {
                u32 i = 0;
                while (i < limit)
                    i = i + 1;
                return i;
            }
            "#,
        );

        match &nodes[0] {
            AstNode::FunctionDef { body, .. } => {
                assert!(matches!(&body[0], AstNode::VarDecl { init: Some(_), .. }));
                match &body[1] {
                    AstNode::While { body, .. } => {
                        assert!(matches!(&body[0], AstNode::Assignment { name, .. } if name == "i"));
                    }
                    other => panic!("Expected while, got {:?}", other),
                }
                assert!(matches!(&body[2], AstNode::Return { .. }));
            }
            other => panic!("Expected function, got {:?}", other),
        }
    }

    #[test]
    fn test_named_type_declaration_vs_call() {
        let nodes = parse("fmt::Header header @ 0; fmt::check(1);");

        assert!(matches!(&nodes[0], AstNode::VarDecl { name, .. } if name == "header"));
        assert!(matches!(
            &nodes[1],
            AstNode::ExpressionStatement { expr, .. } if matches!(**expr, AstNode::FunctionCall { .. })
        ));
    }
}
