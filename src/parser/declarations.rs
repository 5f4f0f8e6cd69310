//! Declaration parsing implementation
//!
//! This module handles parsing of declarations:
//!
//! - Type definitions: `struct`, `union`, `enum`, `bitfield`, `using`
//! - Namespaces and functions
//! - Variable placements: plain variables, arrays and pointers
//! - Type references with optional `be`/`le` prefix
//!
//! # Grammar
//!
//! ```text
//! declaration  ::= struct_def | union_def | enum_def | bitfield_def | using
//!                | namespace | function | variable | statement
//! struct_def   ::= "struct" ident "{" statement* "}" ";"
//! enum_def     ::= "enum" ident ":" type "{" (ident ("=" expr)?),* "}" ";"
//! bitfield_def ::= "bitfield" ident "{" ((ident | "padding") ":" expr ";")* "}" ";"
//! using        ::= "using" ident "=" type ";"
//! namespace    ::= "namespace" ident ("::" ident)* "{" declaration* "}"
//! function     ::= "fn" ident "(" (type? ident),* ")" "{" statement* "}"
//! variable     ::= type ident ("[" array_size "]")? ("@" expr)? ("=" expr)? ";"
//!                | type "*" ident ":" type ("@" expr)? ";"
//!                | "padding" "[" expr "]" ";"
//! type         ::= ("be" | "le")? (builtin | ident ("::" ident)*)
//! ```
//!
//! All parsing methods are implemented as `pub(crate)` methods on the [`Parser`] struct.

use crate::memory::Endian;
use crate::parser::ast::*;
use crate::parser::lexer::Token;
use crate::parser::parse::{ParseError, Parser};

impl Parser {
    /// Parse a top-level declaration or a declaration inside a namespace
    pub(crate) fn parse_top_level_declaration(&mut self) -> Result<AstNode, ParseError> {
        let loc = self.current_location();

        if self.match_token(&Token::Struct(loc)) {
            return self.parse_struct_definition(false);
        }
        if self.match_token(&Token::Union(loc)) {
            return self.parse_struct_definition(true);
        }
        if self.match_token(&Token::Enum(loc)) {
            return self.parse_enum_definition();
        }
        if self.match_token(&Token::Bitfield(loc)) {
            return self.parse_bitfield_definition();
        }
        if self.match_token(&Token::Using(loc)) {
            return self.parse_using();
        }
        if self.match_token(&Token::Namespace(loc)) {
            return self.parse_namespace();
        }
        if self.match_token(&Token::Fn(loc)) {
            return self.parse_function_definition();
        }

        self.parse_statement()
    }

    /// Parse struct or union definition: struct Name { members };
    pub(crate) fn parse_struct_definition(&mut self, is_union: bool) -> Result<AstNode, ParseError> {
        let loc = self.previous_location();
        let kind = if is_union { "union" } else { "struct" };

        let name = self.expect_identifier()?;
        self.expect_lbrace(&format!("after {} name", kind))?;
        let members = self.parse_block_statements()?;
        self.expect_rbrace(&format!("after {} members", kind))?;
        self.expect_semicolon(&format!("after {} definition", kind))?;

        Ok(if is_union {
            AstNode::UnionDef {
                name,
                members,
                location: loc,
            }
        } else {
            AstNode::StructDef {
                name,
                members,
                location: loc,
            }
        })
    }

    /// Parse enum definition: enum Name : type { A, B = expr, ... };
    pub(crate) fn parse_enum_definition(&mut self) -> Result<AstNode, ParseError> {
        let loc = self.previous_location();
        let name = self.expect_identifier()?;

        self.expect_token(
            &Token::Colon(self.current_location()),
            "Expected ':' and an underlying type after enum name",
        )?;
        let underlying = self.parse_type()?;
        self.expect_lbrace("after enum underlying type")?;

        let mut entries = Vec::new();
        while !self.check(&Token::RBrace(self.current_location())) {
            let entry_loc = self.current_location();
            let entry_name = self.expect_identifier()?;
            let value = if self.match_token(&Token::Eq(entry_loc)) {
                Some(self.parse_expression()?)
            } else {
                None
            };
            entries.push(EnumEntry {
                name: entry_name,
                value,
                location: entry_loc,
            });

            if !self.match_token(&Token::Comma(self.current_location())) {
                break;
            }
        }

        self.expect_rbrace("after enum entries")?;
        self.expect_semicolon("after enum definition")?;

        Ok(AstNode::EnumDef {
            name,
            underlying,
            entries,
            location: loc,
        })
    }

    /// Parse bitfield definition: bitfield Name { field : width; ... };
    pub(crate) fn parse_bitfield_definition(&mut self) -> Result<AstNode, ParseError> {
        let loc = self.previous_location();
        let name = self.expect_identifier()?;
        self.expect_lbrace("after bitfield name")?;

        let mut fields = Vec::new();
        while !self.check(&Token::RBrace(self.current_location())) && !self.is_at_end() {
            let field_loc = self.current_location();
            let field_name = match self.peek_token() {
                Token::Type(BuiltinType::Padding, _) => {
                    self.advance();
                    None
                }
                _ => Some(self.expect_identifier()?),
            };
            self.expect_token(
                &Token::Colon(self.current_location()),
                "Expected ':' after bitfield field name",
            )?;
            let width = self.parse_expression()?;
            self.expect_semicolon("after bitfield field")?;

            fields.push(BitfieldField {
                name: field_name,
                width,
                location: field_loc,
            });
        }

        self.expect_rbrace("after bitfield fields")?;
        self.expect_semicolon("after bitfield definition")?;

        Ok(AstNode::BitfieldDef {
            name,
            fields,
            location: loc,
        })
    }

    /// Parse type alias: using Name = type;
    pub(crate) fn parse_using(&mut self) -> Result<AstNode, ParseError> {
        let loc = self.previous_location();
        let name = self.expect_identifier()?;
        self.expect_token(&Token::Eq(self.current_location()), "Expected '=' after alias name")?;
        let target = self.parse_type()?;
        self.expect_semicolon("after using declaration")?;

        Ok(AstNode::Using {
            name,
            target,
            location: loc,
        })
    }

    /// Parse namespace: namespace a::b { declarations }
    pub(crate) fn parse_namespace(&mut self) -> Result<AstNode, ParseError> {
        let loc = self.previous_location();
        let path = self.parse_path()?;
        self.expect_lbrace("after namespace name")?;

        let mut body = Vec::new();
        while !self.check(&Token::RBrace(self.current_location())) && !self.is_at_end() {
            body.push(self.parse_top_level_declaration()?);
        }

        self.expect_rbrace("after namespace body")?;
        // A trailing ';' is tolerated
        self.match_token(&Token::Semicolon(self.current_location()));

        Ok(AstNode::Namespace {
            path,
            body,
            location: loc,
        })
    }

    /// Parse function definition: fn name(params) { body }
    pub(crate) fn parse_function_definition(&mut self) -> Result<AstNode, ParseError> {
        let name = self.expect_identifier()?;
        let loc = self.previous_location();

        self.expect_lparen("after function name")?;
        let params = self.parse_parameter_list()?;
        self.expect_rparen("after parameters")?;

        self.expect_lbrace("before function body")?;
        let body = self.parse_block_statements()?;
        self.expect_rbrace("after function body")?;

        Ok(AstNode::FunctionDef {
            name,
            params,
            body,
            location: loc,
        })
    }

    /// Parse parameter list: (name, name, ...). A type before a name is accepted and ignored.
    fn parse_parameter_list(&mut self) -> Result<Vec<String>, ParseError> {
        let mut params = Vec::new();

        if self.check(&Token::RParen(self.current_location())) {
            return Ok(params);
        }

        loop {
            if self.is_type_start()
                || (matches!(self.peek(), Token::Ident(..))
                    && matches!(self.peek_ahead(1), Some(Token::Ident(..) | Token::ColonColon(_))))
            {
                self.parse_type()?;
            }
            params.push(self.expect_identifier()?);

            if !self.match_token(&Token::Comma(self.current_location())) {
                break;
            }
        }

        Ok(params)
    }

    /// Parse a type reference: [be|le] (builtin | path)
    pub(crate) fn parse_type(&mut self) -> Result<TypeRef, ParseError> {
        let location = self.current_location();

        let endian = if self.match_token(&Token::Be(location)) {
            Some(Endian::Big)
        } else if self.match_token(&Token::Le(location)) {
            Some(Endian::Little)
        } else {
            None
        };

        let kind = match self.peek_token() {
            Token::Type(ty, _) => {
                self.advance();
                TypeKind::Builtin(ty)
            }
            Token::Ident(..) => TypeKind::Named(self.parse_path()?),
            other => return self.error(format!("Expected type, found {}", other)),
        };

        Ok(TypeRef { endian, kind, location })
    }

    /// Parse a variable, array or pointer declaration, starting at its type
    pub(crate) fn parse_variable_declaration(&mut self) -> Result<AstNode, ParseError> {
        let loc = self.current_location();
        let var_type = self.parse_type()?;

        // Anonymous padding: padding[expr];
        if matches!(var_type.kind, TypeKind::Builtin(BuiltinType::Padding))
            && self.check(&Token::LBracket(self.current_location()))
        {
            self.advance();
            let size = self.parse_array_size()?;
            self.expect_semicolon("after padding")?;
            return Ok(AstNode::ArrayDecl {
                name: "padding".to_string(),
                elem_type: var_type,
                size,
                placement: None,
                location: loc,
            });
        }

        // Pointer: type *name : size_type
        if self.match_token(&Token::Star(self.current_location())) {
            let name = self.expect_identifier()?;
            self.expect_token(
                &Token::Colon(self.current_location()),
                "Expected ':' and a size type after pointer name",
            )?;
            let size_type = self.parse_type()?;
            let placement = self.parse_placement()?;
            self.expect_semicolon("after pointer declaration")?;

            return Ok(AstNode::PointerDecl {
                name,
                pointee: var_type,
                size_type,
                placement,
                location: loc,
            });
        }

        let name = self.expect_identifier()?;

        if self.match_token(&Token::LBracket(self.current_location())) {
            let size = self.parse_array_size()?;
            let placement = self.parse_placement()?;
            self.expect_semicolon("after array declaration")?;

            return Ok(AstNode::ArrayDecl {
                name,
                elem_type: var_type,
                size,
                placement,
                location: loc,
            });
        }

        let placement = self.parse_placement()?;
        let init = if self.match_token(&Token::Eq(self.current_location())) {
            Some(Box::new(self.parse_expression()?))
        } else {
            None
        };
        self.expect_semicolon("after variable declaration")?;

        Ok(AstNode::VarDecl {
            name,
            var_type,
            placement,
            init,
            location: loc,
        })
    }

    /// Parse array size after '[': expr ']' | while(expr) ']' | ']'
    fn parse_array_size(&mut self) -> Result<ArraySize, ParseError> {
        if self.match_token(&Token::RBracket(self.current_location())) {
            return Ok(ArraySize::Unsized);
        }

        let size = if self.match_token(&Token::While(self.current_location())) {
            self.expect_lparen("after 'while' in array size")?;
            let condition = self.parse_expression()?;
            self.expect_rparen("after array loop condition")?;
            ArraySize::While(Box::new(condition))
        } else {
            ArraySize::Fixed(Box::new(self.parse_expression()?))
        };

        self.expect_token(
            &Token::RBracket(self.current_location()),
            "Expected ']' after array size",
        )?;
        Ok(size)
    }

    /// Parse optional placement: @ expr
    fn parse_placement(&mut self) -> Result<Option<Box<AstNode>>, ParseError> {
        if self.match_token(&Token::At(self.current_location())) {
            Ok(Some(Box::new(self.parse_expression()?)))
        } else {
            Ok(None)
        }
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
    fn test_enum_entries() {
        let nodes = parse("enum Kind : u8 { A, B = 5, C, };");
        match &nodes[0] {
            AstNode::EnumDef {
                name,
                underlying,
                entries,
                ..
            } => {
                assert_eq!(name, "Kind");
                assert_eq!(underlying.kind, TypeKind::Builtin(BuiltinType::Unsigned(1)));
                assert_eq!(entries.len(), 3);
                assert!(entries[0].value.is_none());
                assert!(entries[1].value.is_some());
            }
            other => panic!("Expected enum, got {:?}", other),
        }
    }

    #[test]
    fn test_bitfield_with_padding() {
        let nodes = parse("bitfield Flags { a : 3; padding : 1; b : 4; };");
        match &nodes[0] {
            AstNode::BitfieldDef { fields, .. } => {
                assert_eq!(fields.len(), 3);
                assert_eq!(fields[0].name.as_deref(), Some("a"));
                assert!(fields[1].name.is_none());
            }
            other => panic!("Expected bitfield, got {:?}", other),
        }
    }

    #[test]
    fn test_array_forms() {
        let nodes = parse("u8 a[4]; char s[]; u8 w[while($ < 8)]; padding[2];");

        assert!(matches!(&nodes[0], AstNode::ArrayDecl { size: ArraySize::Fixed(_), .. }));
        assert!(matches!(&nodes[1], AstNode::ArrayDecl { size: ArraySize::Unsized, .. }));
        assert!(matches!(&nodes[2], AstNode::ArrayDecl { size: ArraySize::While(_), .. }));
        assert!(matches!(&nodes[3], AstNode::ArrayDecl { name, .. } if name == "padding"));
    }

    #[test]
    fn test_pointer_and_endian_prefix() {
        let nodes = parse("be u32 *ptr : u16 @ 0x10;");
        match &nodes[0] {
            AstNode::PointerDecl {
                name,
                pointee,
                size_type,
                placement,
                ..
            } => {
                assert_eq!(name, "ptr");
                assert_eq!(pointee.endian, Some(crate::memory::Endian::Big));
                assert_eq!(size_type.kind, TypeKind::Builtin(BuiltinType::Unsigned(2)));
                assert!(placement.is_some());
            }
            other => panic!("Expected pointer, got {:?}", other),
        }
    }

    #[test]
    fn test_namespace_and_using() {
        let nodes = parse("namespace fmt::v1 { using Word = le u16; }");
        match &nodes[0] {
            AstNode::Namespace { path, body, .. } => {
                assert_eq!(path, &vec!["fmt".to_string(), "v1".to_string()]);
                assert!(matches!(&body[0], AstNode::Using { name, .. } if name == "Word"));
            }
            other => panic!("Expected namespace, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_struct_semicolon() {
        let err = Parser::new("struct A { u8 x; }").unwrap().parse_program().unwrap_err();
        assert!(err.message.contains("after struct definition"));
    }
}
