use crate::ast::{
    Clause, CompareOp, CreateClause, EdgeDirection, EdgePattern, Expr, Literal, MatchClause,
    NodePattern, Query, ReturnClause, ReturnItem,
};
use crate::error::{QueryError, Result};
use crate::lexer::{Lexer, Token, TokenKind};

pub fn parse(input: &str) -> Result<Query> {
    let tokens = Lexer::new(input)
        .tokenize()
        .map_err(|(message, position)| QueryError::parse(message, position))?;
    TokenParser { tokens, position: 0 }.parse_query()
}

struct TokenParser {
    tokens: Vec<Token>,
    position: usize,
}

impl TokenParser {
    fn peek(&self) -> &Token {
        &self.tokens[self.position]
    }

    fn peek_pos(&self) -> usize {
        self.peek().position
    }

    fn advance(&mut self) -> Token {
        let token = self.tokens[self.position].clone();
        if self.position + 1 < self.tokens.len() {
            self.position += 1;
        }
        token
    }

    fn check(&self, kind: &TokenKind) -> bool {
        &self.peek().kind == kind
    }

    fn match_token(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token> {
        if self.check(&kind) {
            Ok(self.advance())
        } else {
            Err(QueryError::parse(
                format!("expected {kind:?}, found {:?}", self.peek().kind),
                self.peek_pos(),
            ))
        }
    }

    fn expect_identifier(&mut self) -> Result<String> {
        match self.advance() {
            Token { kind: TokenKind::Identifier(name), .. } => Ok(name),
            Token { kind, position } => Err(QueryError::parse(
                format!("expected identifier, found {kind:?}"),
                position,
            )),
        }
    }

    fn parse_query(&mut self) -> Result<Query> {
        let mut clauses = Vec::new();
        loop {
            match &self.peek().kind {
                TokenKind::Match => clauses.push(Clause::Match(self.parse_match()?)),
                TokenKind::Where => clauses.push(Clause::Where(self.parse_where()?)),
                TokenKind::Return => clauses.push(Clause::Return(self.parse_return()?)),
                TokenKind::Create => clauses.push(Clause::Create(self.parse_create()?)),
                TokenKind::Eof => break,
                other => {
                    return Err(QueryError::parse(
                        format!("unexpected token {other:?}"),
                        self.peek_pos(),
                    ))
                }
            }
        }
        if clauses.is_empty() {
            return Err(QueryError::parse("empty query", 0));
        }
        Ok(Query { clauses })
    }

    fn parse_match(&mut self) -> Result<MatchClause> {
        self.expect(TokenKind::Match)?;
        let mut nodes = vec![self.parse_node_pattern()?];
        let mut edges = Vec::new();
        loop {
            match &self.peek().kind {
                TokenKind::Dash | TokenKind::LeftArrow => {
                    edges.push(self.parse_edge_pattern()?);
                    nodes.push(self.parse_node_pattern()?);
                }
                _ => break,
            }
        }
        Ok(MatchClause { nodes, edges })
    }

    fn parse_node_pattern(&mut self) -> Result<NodePattern> {
        self.expect(TokenKind::LeftParen)?;
        let mut pattern = NodePattern::default();
        if let TokenKind::Identifier(_) = &self.peek().kind {
            pattern.variable = Some(self.expect_identifier()?);
        }
        if self.match_token(&TokenKind::Colon) {
            pattern.label = Some(self.expect_identifier()?);
        }
        if self.match_token(&TokenKind::LeftBrace) {
            pattern.properties = self.parse_property_map()?;
        }
        self.expect(TokenKind::RightParen)?;
        Ok(pattern)
    }

    fn parse_edge_pattern(&mut self) -> Result<EdgePattern> {
        let direction_in = self.match_token(&TokenKind::LeftArrow);
        if !direction_in {
            self.expect(TokenKind::Dash)?;
        }
        let mut pattern = EdgePattern {
            variable: None,
            edge_type: None,
            direction: EdgeDirection::Out,
        };
        if self.match_token(&TokenKind::LeftBracket) {
            if let TokenKind::Identifier(_) = &self.peek().kind {
                pattern.variable = Some(self.expect_identifier()?);
            }
            if self.match_token(&TokenKind::Colon) {
                pattern.edge_type = Some(self.expect_identifier()?);
            }
            self.expect(TokenKind::RightBracket)?;
        }
        if self.match_token(&TokenKind::RightArrow) {
            if direction_in {
                return Err(QueryError::parse("edge cannot point both ways", self.peek_pos()));
            }
            pattern.direction = EdgeDirection::Out;
        } else {
            self.expect(TokenKind::Dash)?;
            pattern.direction = EdgeDirection::In;
        }
        Ok(pattern)
    }

    fn parse_property_map(&mut self) -> Result<Vec<(String, Literal)>> {
        let mut props = Vec::new();
        if self.check(&TokenKind::RightBrace) {
            self.advance();
            return Ok(props);
        }
        loop {
            let key = self.expect_identifier()?;
            self.expect(TokenKind::Colon)?;
            let value = self.parse_literal()?;
            props.push((key, value));
            if !self.match_token(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RightBrace)?;
        Ok(props)
    }

    fn parse_literal(&mut self) -> Result<Literal> {
        match self.advance() {
            Token { kind: TokenKind::String(s), .. } => Ok(Literal::Str(s)),
            Token { kind: TokenKind::Number(n), .. } => {
                if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
                    Ok(Literal::Int(n as i64))
                } else {
                    Ok(Literal::Float(n))
                }
            }
            Token { kind: TokenKind::Boolean(b), .. } => Ok(Literal::Bool(b)),
            Token { kind: TokenKind::Null, .. } => Ok(Literal::Null),
            Token { kind, position } => {
                Err(QueryError::parse(format!("expected a literal, found {kind:?}"), position))
            }
        }
    }

    fn parse_where(&mut self) -> Result<Expr> {
        self.expect(TokenKind::Where)?;
        self.parse_or_expr()
    }

    fn parse_or_expr(&mut self) -> Result<Expr> {
        let mut left = self.parse_and_expr()?;
        while self.match_token(&TokenKind::Or) {
            let right = self.parse_and_expr()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and_expr(&mut self) -> Result<Expr> {
        let mut left = self.parse_not_expr()?;
        while self.match_token(&TokenKind::And) {
            let right = self.parse_not_expr()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_not_expr(&mut self) -> Result<Expr> {
        if self.match_token(&TokenKind::Not) {
            return Ok(Expr::Not(Box::new(self.parse_not_expr()?)));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr> {
        if self.match_token(&TokenKind::LeftParen) {
            let inner = self.parse_or_expr()?;
            self.expect(TokenKind::RightParen)?;
            return Ok(inner);
        }
        let left = self.parse_operand()?;
        if self.match_token(&TokenKind::Is) {
            let negated = self.match_token(&TokenKind::Not);
            self.expect(TokenKind::Null)?;
            return Ok(if negated {
                Expr::IsNotNull(Box::new(left))
            } else {
                Expr::IsNull(Box::new(left))
            });
        }
        let op = match &self.peek().kind {
            TokenKind::Equals => CompareOp::Eq,
            TokenKind::NotEquals => CompareOp::Ne,
            TokenKind::LessThan => CompareOp::Lt,
            TokenKind::LessEqual => CompareOp::Le,
            TokenKind::GreaterThan => CompareOp::Gt,
            TokenKind::GreaterEqual => CompareOp::Ge,
            _ => return Ok(left),
        };
        self.advance();
        let right = self.parse_operand()?;
        Ok(Expr::Compare(Box::new(left), op, Box::new(right)))
    }

    fn parse_operand(&mut self) -> Result<Expr> {
        match self.advance() {
            Token { kind: TokenKind::Identifier(name), .. } => {
                if self.match_token(&TokenKind::Dot) {
                    let property = self.expect_identifier()?;
                    Ok(Expr::Property(name, property))
                } else {
                    Ok(Expr::Variable(name))
                }
            }
            Token { kind: TokenKind::String(s), .. } => Ok(Expr::Literal(Literal::Str(s))),
            Token { kind: TokenKind::Number(n), .. } => {
                if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
                    Ok(Expr::Literal(Literal::Int(n as i64)))
                } else {
                    Ok(Expr::Literal(Literal::Float(n)))
                }
            }
            Token { kind: TokenKind::Boolean(b), .. } => Ok(Expr::Literal(Literal::Bool(b))),
            Token { kind: TokenKind::Null, .. } => Ok(Expr::Literal(Literal::Null)),
            Token { kind, position } => {
                Err(QueryError::parse(format!("expected an expression, found {kind:?}"), position))
            }
        }
    }

    fn parse_return(&mut self) -> Result<ReturnClause> {
        self.expect(TokenKind::Return)?;
        let mut items = Vec::new();
        loop {
            let expr = self.parse_operand()?;
            let alias = if self.match_token(&TokenKind::As) {
                Some(self.expect_identifier()?)
            } else {
                None
            };
            items.push(ReturnItem { expr, alias });
            if !self.match_token(&TokenKind::Comma) {
                break;
            }
        }
        Ok(ReturnClause { items })
    }

    fn parse_create(&mut self) -> Result<CreateClause> {
        self.expect(TokenKind::Create)?;
        Ok(CreateClause { node: self.parse_node_pattern()? })
    }
}
