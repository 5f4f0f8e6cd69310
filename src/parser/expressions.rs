//! Expression parsing implementation
//!
//! This module handles parsing of pattern expressions using precedence climbing
//! for binary operators and recursive descent for other expression forms.
//!
//! # Supported Expressions
//!
//! - Literals: numbers, characters, strings, `true`/`false`
//! - `$` (current offset) and `parent`
//! - Identifiers and namespace paths (`Enum::Entry`)
//! - Binary operators: arithmetic, comparison, logical, bitwise
//! - Unary operators: `-`, `+`, `!`, `~`, `*`
//! - Postfix: `[]`, `.`, `()`
//! - Ternary: `? :`
//! - `sizeof(type | expr)` and `addressof(expr)`
//!
//! # Precedence
//!
//! Binary operators follow C precedence rules using a precedence climbing
//! algorithm for efficient and correct parsing.
//!
//! All parsing methods are implemented as `pub(crate)` methods on the [`Parser`] struct.

use crate::memory::value::Value;
use crate::interpreter::constants::MAX_EXPRESSION_DEPTH;
use crate::parser::ast::*;
use crate::parser::lexer::Token;
use crate::parser::parse::{ParseError, Parser};

impl Parser {
    /// Parse expression (top-level entry point)
    pub(crate) fn parse_expression(&mut self) -> Result<AstNode, ParseError> {
        self.nested(Self::parse_ternary)
    }

    /// Run `parse` one nesting level deeper, failing past `MAX_EXPRESSION_DEPTH`
    fn nested(&mut self, parse: fn(&mut Self) -> Result<AstNode, ParseError>) -> Result<AstNode, ParseError> {
        if self.depth >= MAX_EXPRESSION_DEPTH {
            return self.error("expression nested too deeply");
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    /// Parse ternary: condition ? true_expr : false_expr
    fn parse_ternary(&mut self) -> Result<AstNode, ParseError> {
        let expr = self.parse_logical_or()?;

        if self.match_token(&Token::Question(self.current_location())) {
            let loc = self.previous_location();
            let true_expr = Box::new(self.parse_expression()?);
            self.expect_token(
                &Token::Colon(self.current_location()),
                "Expected ':' in ternary expression",
            )?;
            let false_expr = Box::new(self.parse_expression()?);

            return Ok(AstNode::TernaryOp {
                condition: Box::new(expr),
                true_expr,
                false_expr,
                location: loc,
            });
        }

        Ok(expr)
    }

    /// Build a left-associative chain of binary operators at one precedence level
    fn parse_binary_level(
        &mut self,
        operators: &[(Token, BinOp)],
        next: fn(&mut Self) -> Result<AstNode, ParseError>,
    ) -> Result<AstNode, ParseError> {
        let mut left = next(self)?;

        loop {
            let loc = self.current_location();
            let Some(op) = operators
                .iter()
                .find(|(token, _)| self.check(token))
                .map(|(_, op)| *op)
            else {
                break;
            };
            self.advance();

            let right = Box::new(next(self)?);
            left = AstNode::BinaryOp {
                op,
                left: Box::new(left),
                right,
                location: loc,
            };
        }

        Ok(left)
    }

    /// Parse logical OR (||)
    fn parse_logical_or(&mut self) -> Result<AstNode, ParseError> {
        let loc = self.current_location();
        self.parse_binary_level(&[(Token::OrOr(loc), BinOp::Or)], Self::parse_logical_and)
    }

    /// Parse logical AND (&&)
    fn parse_logical_and(&mut self) -> Result<AstNode, ParseError> {
        let loc = self.current_location();
        self.parse_binary_level(&[(Token::AndAnd(loc), BinOp::And)], Self::parse_bitwise_or)
    }

    /// Parse bitwise OR (|)
    fn parse_bitwise_or(&mut self) -> Result<AstNode, ParseError> {
        let loc = self.current_location();
        self.parse_binary_level(&[(Token::Pipe(loc), BinOp::BitOr)], Self::parse_bitwise_xor)
    }

    /// Parse bitwise XOR (^)
    fn parse_bitwise_xor(&mut self) -> Result<AstNode, ParseError> {
        let loc = self.current_location();
        self.parse_binary_level(&[(Token::Caret(loc), BinOp::BitXor)], Self::parse_bitwise_and)
    }

    /// Parse bitwise AND (&)
    fn parse_bitwise_and(&mut self) -> Result<AstNode, ParseError> {
        let loc = self.current_location();
        self.parse_binary_level(&[(Token::Amp(loc), BinOp::BitAnd)], Self::parse_equality)
    }

    /// Parse equality (== !=)
    fn parse_equality(&mut self) -> Result<AstNode, ParseError> {
        let loc = self.current_location();
        self.parse_binary_level(
            &[(Token::EqEq(loc), BinOp::Eq), (Token::NotEq(loc), BinOp::Ne)],
            Self::parse_relational,
        )
    }

    /// Parse relational (< <= > >=)
    fn parse_relational(&mut self) -> Result<AstNode, ParseError> {
        let loc = self.current_location();
        self.parse_binary_level(
            &[
                (Token::Lt(loc), BinOp::Lt),
                (Token::LtEq(loc), BinOp::Le),
                (Token::Gt(loc), BinOp::Gt),
                (Token::GtEq(loc), BinOp::Ge),
            ],
            Self::parse_shift,
        )
    }

    /// Parse bitwise shift (<< >>)
    fn parse_shift(&mut self) -> Result<AstNode, ParseError> {
        let loc = self.current_location();
        self.parse_binary_level(
            &[(Token::LtLt(loc), BinOp::BitShl), (Token::GtGt(loc), BinOp::BitShr)],
            Self::parse_additive,
        )
    }

    /// Parse additive (+ -)
    fn parse_additive(&mut self) -> Result<AstNode, ParseError> {
        let loc = self.current_location();
        self.parse_binary_level(
            &[(Token::Plus(loc), BinOp::Add), (Token::Minus(loc), BinOp::Sub)],
            Self::parse_multiplicative,
        )
    }

    /// Parse multiplicative (* / %)
    fn parse_multiplicative(&mut self) -> Result<AstNode, ParseError> {
        let loc = self.current_location();
        self.parse_binary_level(
            &[
                (Token::Star(loc), BinOp::Mul),
                (Token::Slash(loc), BinOp::Div),
                (Token::Percent(loc), BinOp::Mod),
            ],
            Self::parse_unary,
        )
    }

    /// Parse unary (! ~ - + * sizeof addressof)
    fn parse_unary(&mut self) -> Result<AstNode, ParseError> {
        let loc = self.current_location();

        let prefix = match self.peek() {
            Token::Bang(_) => Some(UnOp::Not),
            Token::Tilde(_) => Some(UnOp::BitNot),
            Token::Minus(_) => Some(UnOp::Neg),
            Token::Plus(_) => Some(UnOp::Plus),
            Token::Star(_) => Some(UnOp::Deref),
            _ => None,
        };

        if let Some(op) = prefix {
            self.advance();
            let operand = Box::new(self.nested(Self::parse_unary)?);
            return Ok(AstNode::UnaryOp {
                op,
                operand,
                location: loc,
            });
        }

        if self.match_token(&Token::Sizeof(loc)) {
            self.expect_lparen("after 'sizeof'")?;
            let operand = if self.is_type_start() {
                SizeofOperand::Type(self.parse_type()?)
            } else {
                // Named types and patterns share syntax; the evaluator decides
                SizeofOperand::Expr(Box::new(self.parse_expression()?))
            };
            self.expect_rparen("after sizeof operand")?;

            return Ok(AstNode::SizeOf { operand, location: loc });
        }

        if self.match_token(&Token::AddressOf(loc)) {
            self.expect_lparen("after 'addressof'")?;
            let expr = Box::new(self.parse_expression()?);
            self.expect_rparen("after addressof operand")?;

            return Ok(AstNode::AddressOf { expr, location: loc });
        }

        self.parse_postfix()
    }

    /// Parse postfix ([] .)
    fn parse_postfix(&mut self) -> Result<AstNode, ParseError> {
        let mut expr = self.parse_primary()?;

        loop {
            let loc = self.current_location();

            if self.match_token(&Token::LBracket(loc)) {
                let index = Box::new(self.parse_expression()?);
                self.expect_token(
                    &Token::RBracket(self.current_location()),
                    "Expected ']' after array index",
                )?;
                expr = AstNode::ArrayAccess {
                    array: Box::new(expr),
                    index,
                    location: loc,
                };
            } else if self.match_token(&Token::Dot(loc)) {
                let member = self.expect_identifier()?;
                expr = AstNode::MemberAccess {
                    object: Box::new(expr),
                    member,
                    location: loc,
                };
            } else {
                break;
            }
        }

        Ok(expr)
    }

    /// Parse argument list: (expr, expr, ...)
    fn parse_argument_list(&mut self) -> Result<Vec<AstNode>, ParseError> {
        let mut args = Vec::new();

        if self.check(&Token::RParen(self.current_location())) {
            return Ok(args);
        }

        loop {
            args.push(self.parse_expression()?);

            if !self.match_token(&Token::Comma(self.current_location())) {
                break;
            }
        }

        Ok(args)
    }

    /// Parse primary (literals, names, calls, parenthesized expressions)
    fn parse_primary(&mut self) -> Result<AstNode, ParseError> {
        let loc = self.current_location();

        match self.peek_token() {
            Token::NumberLiteral(value, _) => {
                self.advance();
                Ok(AstNode::Literal(value, loc))
            }
            Token::CharLiteral(c, _) => {
                self.advance();
                Ok(AstNode::Literal(Value::Char(c), loc))
            }
            Token::StringLiteral(s, _) => {
                self.advance();
                Ok(AstNode::StringLiteral(s, loc))
            }
            Token::True(_) | Token::False(_) => {
                let value = matches!(self.advance(), Token::True(_));
                Ok(AstNode::Literal(Value::Bool(value), loc))
            }
            Token::Dollar(_) => {
                self.advance();
                Ok(AstNode::CurrentOffset(loc))
            }
            Token::Parent(_) => {
                self.advance();
                Ok(AstNode::Parent(loc))
            }
            Token::Ident(..) => {
                let mut path = self.parse_path()?;

                if self.match_token(&Token::LParen(self.current_location())) {
                    let args = self.parse_argument_list()?;
                    self.expect_rparen("after function arguments")?;
                    let name = path.pop().unwrap_or_default();

                    return Ok(AstNode::FunctionCall {
                        path: NamespacePath(path),
                        name,
                        args,
                        location: loc,
                    });
                }

                if path.len() == 1 {
                    Ok(AstNode::Identifier(path.remove(0), loc))
                } else {
                    Ok(AstNode::ScopedName { path, location: loc })
                }
            }
            Token::LParen(_) => {
                self.advance();
                let expr = self.parse_expression()?;
                self.expect_rparen("after expression")?;
                Ok(expr)
            }
            other => Err(ParseError {
                message: format!("Expected expression, found {}", other),
                location: loc,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::memory::value::Value;
    use crate::parser::ast::*;
    use crate::parser::parse::Parser;

    fn expr(source: &str) -> AstNode {
        let program = Parser::new(&format!("{};", source)).unwrap().parse_program().unwrap();
        match program.nodes.into_iter().next() {
            Some(AstNode::ExpressionStatement { expr, .. }) => *expr,
            other => panic!("Expected expression statement, got {:?}", other),
        }
    }

    #[test]
    fn test_precedence() {
        // 1 + 2 * 3 parses as 1 + (2 * 3)
        match expr("1 + 2 * 3") {
            AstNode::BinaryOp { op, right, .. } => {
                assert_eq!(op, BinOp::Add);
                assert!(matches!(*right, AstNode::BinaryOp { op: BinOp::Mul, .. }));
            }
            other => panic!("Expected binary op, got {:?}", other),
        }

        // a | b & c parses as a | (b & c)
        match expr("a | b & c") {
            AstNode::BinaryOp { op, right, .. } => {
                assert_eq!(op, BinOp::BitOr);
                assert!(matches!(*right, AstNode::BinaryOp { op: BinOp::BitAnd, .. }));
            }
            other => panic!("Expected binary op, got {:?}", other),
        }
    }

    #[test]
    fn test_scoped_call() {
        match expr("std::mem::read_unsigned($, 4)") {
            AstNode::FunctionCall { path, name, args, .. } => {
                assert_eq!(path.to_string(), "std::mem");
                assert_eq!(name, "read_unsigned");
                assert!(matches!(args[0], AstNode::CurrentOffset(_)));
            }
            other => panic!("Expected call, got {:?}", other),
        }
    }

    #[test]
    fn test_member_and_index_chain() {
        match expr("parent.entries[2].size") {
            AstNode::MemberAccess { object, member, .. } => {
                assert_eq!(member, "size");
                match *object {
                    AstNode::ArrayAccess { array, .. } => {
                        assert!(matches!(*array, AstNode::MemberAccess { ref object, .. }
                            if matches!(**object, AstNode::Parent(_))));
                    }
                    other => panic!("Expected index, got {:?}", other),
                }
            }
            other => panic!("Expected member access, got {:?}", other),
        }
    }

    #[test]
    fn test_sizeof_and_addressof() {
        assert!(matches!(
            expr("sizeof(u32)"),
            AstNode::SizeOf {
                operand: SizeofOperand::Type(_),
                ..
            }
        ));
        assert!(matches!(
            expr("sizeof(header)"),
            AstNode::SizeOf {
                operand: SizeofOperand::Expr(_),
                ..
            }
        ));
        assert!(matches!(expr("addressof(header.magic)"), AstNode::AddressOf { .. }));
    }

    #[test]
    fn test_nesting_depth_is_limited() {
        let nested = |depth: usize| format!("{}1{};", "(".repeat(depth), ")".repeat(depth));

        assert!(Parser::new(&nested(50)).unwrap().parse_program().is_ok());

        let err = Parser::new(&format!("u8 x;\nstd::print({});", nested(2000).trim_end_matches(';')))
            .unwrap()
            .parse_program()
            .unwrap_err();
        assert_eq!(err.message, "expression nested too deeply");
        assert_eq!(err.location.line, 2);

        let complements = format!("{}1;", "~".repeat(2000));
        let err = Parser::new(&complements).unwrap().parse_program().unwrap_err();
        assert_eq!(err.message, "expression nested too deeply");
    }

    #[test]
    fn test_ternary_and_literals() {
        match expr("true ? 'a' : Kind::B") {
            AstNode::TernaryOp {
                condition,
                true_expr,
                false_expr,
                ..
            } => {
                assert!(matches!(*condition, AstNode::Literal(Value::Bool(true), _)));
                assert!(matches!(*true_expr, AstNode::Literal(Value::Char(b'a'), _)));
                assert!(matches!(*false_expr, AstNode::ScopedName { ref path, .. } if path.len() == 2));
            }
            other => panic!("Expected ternary, got {:?}", other),
        }
    }
}
