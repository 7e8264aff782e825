use crate::ast::*;
use crate::diagnostic::Diagnostic;
use crate::lexeme::Lexeme;
use crate::span::{Span, Spanned};

const MAX_NESTING_DEPTH: u32 = 256;

pub(crate) struct Parser {
    tokens: Vec<Spanned<Lexeme>>,
    pos: usize,
    diagnostics: Vec<Diagnostic>,
    depth: u32,
}

impl Parser {
    pub(crate) fn new(tokens: Vec<Spanned<Lexeme>>) -> Self {
        Self {
            tokens,
            pos: 0,
            diagnostics: Vec::new(),
            depth: 0,
        }
    }

    fn enter_nesting(&mut self) -> bool {
        self.depth += 1;
        if self.depth > MAX_NESTING_DEPTH {
            self.error_with_help(
                "nesting depth exceeded (maximum 256 levels)",
                "extract deeply nested code into separate functions",
            );
            return false;
        }
        true
    }

    fn exit_nesting(&mut self) {
        self.depth -= 1;
    }

    pub(crate) fn parse_file(mut self) -> Result<File, Vec<Diagnostic>> {
        let items = self.parse_items();
        if !self.diagnostics.is_empty() {
            return Err(self.diagnostics);
        }
        Ok(File { items })
    }

    fn parse_items(&mut self) -> Vec<Spanned<Item>> {
        let mut items = Vec::new();
        while !self.at(&Lexeme::Eof) {
            let start = self.current_span();

            let mut decorators = Vec::new();
            while self.at(&Lexeme::At) {
                let at = self.current_span();
                self.advance();
                let name = self.expect_ident();
                if name.node != "fs" {
                    self.diagnostics.push(
                        Diagnostic::error(format!("unknown marker `@{}`", name.node), name.span)
                            .with_help("the only function marker is `@fs`".to_string()),
                    );
                }
                decorators.push(Spanned::new(name.node, at.merge(name.span)));
            }

            if !decorators.is_empty() && !self.at(&Lexeme::Fn) {
                self.error_at_current("markers are only allowed on functions");
            }

            if self.at(&Lexeme::Fn) {
                let item = self.parse_fn(decorators);
                let span = start.merge(self.prev_span());
                items.push(Spanned::new(Item::Fn(item), span));
            } else if self.at(&Lexeme::Use) {
                let item = self.parse_use();
                let span = start.merge(self.prev_span());
                items.push(Spanned::new(Item::Use(item), span));
            } else if self.at(&Lexeme::Const) {
                let item = self.parse_const();
                let span = start.merge(self.prev_span());
                items.push(Spanned::new(Item::Const(item), span));
            } else {
                self.error_with_help(
                    &format!("expected item, found {}", self.peek().description()),
                    "top-level items must be `fn`, `const`, or `use` declarations",
                );
                self.advance(); // skip to recover
            }
            self.eat(&Lexeme::Semicolon);
        }
        items
    }

    fn parse_use(&mut self) -> UseDecl {
        self.expect(&Lexeme::Use);
        let start = self.current_span();
        let path = self.parse_module_path();
        if !path.is_qualified() {
            self.error_with_help(
                "`use` needs a qualified path",
                "write the library module and the primitive, e.g. `use math.erf`",
            );
        }
        let span = start.merge(self.prev_span());
        UseDecl {
            path: Spanned::new(path, span),
        }
    }

    fn parse_const(&mut self) -> ConstDef {
        self.expect(&Lexeme::Const);
        let name = self.expect_ident();
        self.expect(&Lexeme::Eq);
        let value = self.parse_expr();
        ConstDef { name, value }
    }

    fn parse_fn(&mut self, decorators: Vec<Spanned<String>>) -> FnDef {
        self.expect(&Lexeme::Fn);
        let name = self.expect_ident();
        self.expect(&Lexeme::LParen);
        let mut params = Vec::new();
        while !self.at(&Lexeme::RParen) && !self.at(&Lexeme::Eof) {
            let param = self.expect_ident();
            if params.iter().any(|p: &Spanned<String>| p.node == param.node) {
                self.diagnostics.push(Diagnostic::error(
                    format!("duplicate parameter `{}`", param.node),
                    param.span,
                ));
            }
            params.push(param);
            if !self.eat(&Lexeme::Comma) {
                break;
            }
        }
        self.expect(&Lexeme::RParen);
        let body = self.parse_block();
        FnDef {
            decorators,
            name,
            params,
            body,
        }
    }

    fn parse_module_path(&mut self) -> ModulePath {
        let first = self.expect_ident();
        let mut parts = vec![first.node];
        while self.eat(&Lexeme::Dot) {
            if let Some(ident) = self.try_ident() {
                parts.push(ident.node);
            } else {
                self.error_at_current("expected identifier after '.'");
                break;
            }
        }
        ModulePath(parts)
    }

    // --- Block and statement parsing ---

    fn parse_block(&mut self) -> Spanned<Block> {
        if !self.enter_nesting() {
            let span = self.current_span();
            // Skip to EOF to abort parsing entirely; the nesting
            // depth error has already been recorded.
            while !self.at(&Lexeme::Eof) {
                self.advance();
            }
            return Spanned::new(
                Block {
                    stmts: Vec::new(),
                    tail_expr: None,
                },
                span,
            );
        }

        let start = self.current_span();
        self.expect(&Lexeme::LBrace);

        let mut stmts = Vec::new();
        let mut tail_expr = None;

        while !self.at(&Lexeme::RBrace) && !self.at(&Lexeme::Eof) {
            if self.eat(&Lexeme::Semicolon) {
                continue;
            }
            if self.at(&Lexeme::Let) {
                stmts.push(self.parse_let_stmt());
            } else if self.at(&Lexeme::If) {
                stmts.push(self.parse_if_stmt());
            } else if self.at(&Lexeme::For) {
                stmts.push(self.parse_for_stmt());
            } else if self.at(&Lexeme::While) {
                stmts.push(self.parse_while_stmt());
            } else if self.at(&Lexeme::Return) {
                stmts.push(self.parse_return_stmt());
            } else {
                // Parse as expression statement or tail expression
                let expr = self.parse_expr();

                if self.at(&Lexeme::RBrace) {
                    // Tail expression: last expression before }, used as block value
                    tail_expr = Some(Box::new(expr));
                } else if self.eat(&Lexeme::Eq) {
                    let value = self.parse_expr();
                    let span = expr.span.merge(value.span);
                    if let Expr::Tuple(elements) = &expr.node {
                        let places = elements.iter().map(|e| self.expr_to_place(e)).collect();
                        stmts.push(Spanned::new(Stmt::TupleAssign { places, value }, span));
                    } else {
                        let place = self.expr_to_place(&expr);
                        stmts.push(Spanned::new(Stmt::Assign { place, value }, span));
                    }
                } else {
                    let span = expr.span;
                    stmts.push(Spanned::new(Stmt::Expr(expr), span));
                }
            }
        }

        let end = self.current_span();
        self.expect(&Lexeme::RBrace);
        let span = start.merge(end);
        self.exit_nesting();
        Spanned::new(Block { stmts, tail_expr }, span)
    }

    fn parse_let_stmt(&mut self) -> Spanned<Stmt> {
        let start = self.current_span();
        self.expect(&Lexeme::Let);

        let pattern = if self.eat(&Lexeme::LParen) {
            // Tuple destructuring: let (a, b, ...) = ...
            let mut names = Vec::new();
            while !self.at(&Lexeme::RParen) && !self.at(&Lexeme::Eof) {
                names.push(self.expect_ident());
                if !self.eat(&Lexeme::Comma) {
                    break;
                }
            }
            self.expect(&Lexeme::RParen);
            Pattern::Tuple(names)
        } else {
            Pattern::Name(self.expect_ident())
        };

        self.expect(&Lexeme::Eq);
        let init = self.parse_expr();
        let span = start.merge(init.span);
        Spanned::new(Stmt::Let { pattern, init }, span)
    }

    fn parse_if_stmt(&mut self) -> Spanned<Stmt> {
        let start = self.current_span();
        self.expect(&Lexeme::If);
        let cond = self.parse_expr();
        let then_block = self.parse_block();
        let else_block = if self.eat(&Lexeme::Else) {
            if self.at(&Lexeme::If) {
                // `else if`: desugar to `else { if ... }`
                let inner_if = self.parse_if_stmt();
                let span = inner_if.span;
                Some(Spanned::new(
                    Block {
                        stmts: vec![inner_if],
                        tail_expr: None,
                    },
                    span,
                ))
            } else {
                Some(self.parse_block())
            }
        } else {
            None
        };
        let span = start.merge(self.prev_span());
        Spanned::new(
            Stmt::If {
                cond,
                then_block,
                else_block,
            },
            span,
        )
    }

    fn parse_for_stmt(&mut self) -> Spanned<Stmt> {
        let start = self.current_span();
        self.expect(&Lexeme::For);
        let var = self.expect_ident();
        self.expect(&Lexeme::In);
        let range_start = self.parse_expr();
        self.expect(&Lexeme::DotDot);
        let range_end = self.parse_expr();
        let body = self.parse_block();
        let span = start.merge(self.prev_span());
        Spanned::new(
            Stmt::For {
                var,
                start: range_start,
                end: range_end,
                body,
            },
            span,
        )
    }

    fn parse_while_stmt(&mut self) -> Spanned<Stmt> {
        let start = self.current_span();
        self.expect(&Lexeme::While);
        let cond = self.parse_expr();
        let body = self.parse_block();
        let span = start.merge(self.prev_span());
        Spanned::new(Stmt::While { cond, body }, span)
    }

    fn parse_return_stmt(&mut self) -> Spanned<Stmt> {
        let start = self.current_span();
        self.expect(&Lexeme::Return);
        let value = if !self.at(&Lexeme::RBrace)
            && !self.at(&Lexeme::Semicolon)
            && !self.at(&Lexeme::Eof)
        {
            Some(self.parse_expr())
        } else {
            None
        };
        let span = start.merge(self.prev_span());
        Spanned::new(Stmt::Return(value), span)
    }

    // --- Expression parsing ---

    pub(crate) fn parse_expr(&mut self) -> Spanned<Expr> {
        self.parse_expr_bp(0)
    }

    fn parse_expr_bp(&mut self, min_bp: u8) -> Spanned<Expr> {
        if !self.enter_nesting() {
            let span = self.current_span();
            while !self.at(&Lexeme::Eof) {
                self.advance();
            }
            return Spanned::new(Expr::Literal(Literal::Number(0.0)), span);
        }

        let mut lhs = self.parse_unary();

        loop {
            let op = match self.peek() {
                Lexeme::PipePipe => BinOp::Or,
                Lexeme::AmpAmp => BinOp::And,
                Lexeme::EqEq => BinOp::Eq,
                Lexeme::BangEq => BinOp::Ne,
                Lexeme::Lt => BinOp::Lt,
                Lexeme::LtEq => BinOp::Le,
                Lexeme::Gt => BinOp::Gt,
                Lexeme::GtEq => BinOp::Ge,
                Lexeme::Plus => BinOp::Add,
                Lexeme::Minus => BinOp::Sub,
                Lexeme::Star => BinOp::Mul,
                Lexeme::Slash => BinOp::Div,
                Lexeme::Percent => BinOp::Rem,
                Lexeme::StarStar => BinOp::Pow,
                _ => break,
            };

            let (l_bp, r_bp) = op.binding_power();
            if l_bp < min_bp {
                break;
            }

            self.advance(); // consume operator
            let rhs = self.parse_expr_bp(r_bp);
            let span = lhs.span.merge(rhs.span);
            lhs = Spanned::new(
                Expr::BinOp {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
                span,
            );
        }

        self.exit_nesting();
        lhs
    }

    fn parse_unary(&mut self) -> Spanned<Expr> {
        let start = self.current_span();
        let op = match self.peek() {
            Lexeme::Minus => UnaryOp::Neg,
            Lexeme::Bang => UnaryOp::Not,
            _ => {
                let primary = self.parse_primary();
                return self.parse_postfix(primary);
            }
        };
        self.advance();
        let operand = self.parse_expr_bp(UnaryOp::BINDING_POWER);
        let span = start.merge(operand.span);
        Spanned::new(
            Expr::Unary {
                op,
                operand: Box::new(operand),
            },
            span,
        )
    }

    /// Parse postfix operations: `[index]` and `[start..end]`.
    fn parse_postfix(&mut self, mut expr: Spanned<Expr>) -> Spanned<Expr> {
        while self.at(&Lexeme::LBracket) {
            self.advance();
            let index = self.parse_expr();
            if self.eat(&Lexeme::DotDot) {
                let end = self.parse_expr();
                self.expect(&Lexeme::RBracket);
                let span = expr.span.merge(self.prev_span());
                expr = Spanned::new(
                    Expr::Slice {
                        expr: Box::new(expr),
                        start: Box::new(index),
                        end: Box::new(end),
                    },
                    span,
                );
            } else {
                self.expect(&Lexeme::RBracket);
                let span = expr.span.merge(self.prev_span());
                expr = Spanned::new(
                    Expr::Index {
                        expr: Box::new(expr),
                        index: Box::new(index),
                    },
                    span,
                );
            }
        }
        expr
    }

    fn parse_primary(&mut self) -> Spanned<Expr> {
        let start = self.current_span();

        match self.peek().clone() {
            Lexeme::Number(n) => {
                self.advance();
                Spanned::new(Expr::Literal(Literal::Number(n)), start)
            }
            Lexeme::True => {
                self.advance();
                Spanned::new(Expr::Literal(Literal::Bool(true)), start)
            }
            Lexeme::False => {
                self.advance();
                Spanned::new(Expr::Literal(Literal::Bool(false)), start)
            }
            Lexeme::LParen => {
                self.advance();
                let first = self.parse_expr();
                if self.eat(&Lexeme::Comma) {
                    let mut elements = vec![first];
                    while !self.at(&Lexeme::RParen) && !self.at(&Lexeme::Eof) {
                        elements.push(self.parse_expr());
                        if !self.eat(&Lexeme::Comma) {
                            break;
                        }
                    }
                    self.expect(&Lexeme::RParen);
                    let span = start.merge(self.prev_span());
                    Spanned::new(Expr::Tuple(elements), span)
                } else {
                    // Parenthesized expression
                    self.expect(&Lexeme::RParen);
                    first
                }
            }
            Lexeme::LBracket => {
                self.advance();
                let mut elements = Vec::new();
                while !self.at(&Lexeme::RBracket) && !self.at(&Lexeme::Eof) {
                    elements.push(self.parse_expr());
                    if !self.eat(&Lexeme::Comma) {
                        break;
                    }
                }
                self.expect(&Lexeme::RBracket);
                let span = start.merge(self.prev_span());
                Spanned::new(Expr::ArrayInit(elements), span)
            }
            Lexeme::Ident(_) => {
                let path = self.parse_module_path();
                let path_span = start.merge(self.prev_span());

                if self.at(&Lexeme::LParen) {
                    self.advance();
                    let args = self.parse_call_args();
                    self.expect(&Lexeme::RParen);
                    let span = start.merge(self.prev_span());
                    Spanned::new(
                        Expr::Call {
                            path: Spanned::new(path, path_span),
                            args,
                        },
                        span,
                    )
                } else if path.is_qualified() {
                    Spanned::new(Expr::Path(path), path_span)
                } else {
                    let name = path.0.into_iter().next().unwrap_or_default();
                    Spanned::new(Expr::Var(name), path_span)
                }
            }
            _ => {
                self.error_with_help(
                    &format!("expected expression, found {}", self.peek().description()),
                    "expressions start with a literal, a name, '(', '[', '-' or '!'",
                );
                self.advance();
                Spanned::new(Expr::Literal(Literal::Number(0.0)), start)
            }
        }
    }

    fn parse_call_args(&mut self) -> Vec<Spanned<Expr>> {
        let mut args = Vec::new();
        while !self.at(&Lexeme::RParen) && !self.at(&Lexeme::Eof) {
            args.push(self.parse_expr());
            if !self.eat(&Lexeme::Comma) {
                break;
            }
        }
        args
    }

    fn expr_to_place(&mut self, expr: &Spanned<Expr>) -> Spanned<Place> {
        match &expr.node {
            Expr::Var(name) if name == "_" => Spanned::new(Place::Discard, expr.span),
            Expr::Var(name) => Spanned::new(Place::Var(name.clone()), expr.span),
            Expr::Index { expr: base, index } => match &base.node {
                Expr::Var(name) => Spanned::new(
                    Place::Index {
                        base: Spanned::new(name.clone(), base.span),
                        index: index.clone(),
                    },
                    expr.span,
                ),
                _ => self.invalid_place(expr.span),
            },
            _ => self.invalid_place(expr.span),
        }
    }

    fn invalid_place(&mut self, span: Span) -> Spanned<Place> {
        self.diagnostics.push(
            Diagnostic::error("invalid assignment target".to_string(), span)
                .with_help("assign to a variable `x = ...` or an element `x[i] = ...`".to_string()),
        );
        Spanned::new(Place::Discard, span)
    }

    // --- Utility methods ---

    fn peek(&self) -> &Lexeme {
        &self.tokens[self.pos].node
    }

    fn current_span(&self) -> Span {
        self.tokens[self.pos].span
    }

    fn prev_span(&self) -> Span {
        if self.pos > 0 {
            self.tokens[self.pos - 1].span
        } else {
            self.current_span()
        }
    }

    fn advance(&mut self) -> &Spanned<Lexeme> {
        let tok = &self.tokens[self.pos];
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    fn at(&self, token: &Lexeme) -> bool {
        std::mem::discriminant(self.peek()) == std::mem::discriminant(token)
    }

    fn eat(&mut self, token: &Lexeme) -> bool {
        if self.at(token) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Lexeme) -> Span {
        if self.at(token) {
            let span = self.current_span();
            self.advance();
            span
        } else {
            self.error_at_current(&format!(
                "expected {}, found {}",
                token.description(),
                self.peek().description()
            ));
            self.current_span()
        }
    }

    fn expect_ident(&mut self) -> Spanned<String> {
        if let Lexeme::Ident(name) = self.peek().clone() {
            let span = self.current_span();
            self.advance();
            Spanned::new(name, span)
        } else {
            self.error_at_current(&format!(
                "expected identifier, found {}",
                self.peek().description()
            ));
            Spanned::new("_error_".to_string(), self.current_span())
        }
    }

    fn try_ident(&mut self) -> Option<Spanned<String>> {
        if let Lexeme::Ident(name) = self.peek().clone() {
            let span = self.current_span();
            self.advance();
            Some(Spanned::new(name, span))
        } else {
            None
        }
    }

    fn error_at_current(&mut self, msg: &str) {
        self.diagnostics
            .push(Diagnostic::error(msg.to_string(), self.current_span()));
    }

    fn error_with_help(&mut self, msg: &str, help: &str) {
        self.diagnostics.push(
            Diagnostic::error(msg.to_string(), self.current_span()).with_help(help.to_string()),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;

    fn parse(source: &str) -> File {
        let (tokens, lex_diags) = Lexer::new(source, 0).tokenize();
        assert!(lex_diags.is_empty(), "lex errors: {:?}", lex_diags);
        Parser::new(tokens).parse_file().unwrap()
    }

    fn parse_err(source: &str) -> Vec<Diagnostic> {
        let (tokens, _) = Lexer::new(source, 0).tokenize();
        Parser::new(tokens).parse_file().unwrap_err()
    }

    fn first_fn(file: &File) -> &FnDef {
        file.functions().next().expect("expected a function")
    }

    #[test]
    fn test_function_with_params() {
        let file = parse("fn add(a, b) {\n    a + b\n}");
        let f = first_fn(&file);
        assert_eq!(f.name.node, "add");
        assert_eq!(f.params.len(), 2);
        assert!(f.body.node.tail_expr.is_some());
        assert!(f.decorators.is_empty());
    }

    #[test]
    fn test_fs_marker() {
        let file = parse("@fs\nfn parent(a) {\n    child(2 * a)\n}");
        let f = first_fn(&file);
        assert!(f.has_decorator("fs"));
        assert_eq!(f.decorators[0].span.start, 0);
    }

    #[test]
    fn test_unknown_marker_rejected() {
        let errs = parse_err("@jit\nfn f(a) { a }");
        assert!(errs[0].message.contains("unknown marker"));
    }

    #[test]
    fn test_use_and_const_items() {
        let file = parse("use math.erf\nconst SCALE = 2.5\nfn f(x) { erf(x) * SCALE }");
        assert!(matches!(&file.items[0].node, Item::Use(u) if u.path.node.as_dotted() == "math.erf"));
        assert!(matches!(&file.items[1].node, Item::Const(c) if c.name.node == "SCALE"));
        assert_eq!(file.items.len(), 3);
    }

    #[test]
    fn test_unqualified_use_rejected() {
        let errs = parse_err("use erf\n");
        assert!(errs[0].message.contains("qualified"));
    }

    #[test]
    fn test_precedence() {
        let file = parse("fn f(a, b, c) { a + b * c }");
        let tail = first_fn(&file).body.node.tail_expr.as_ref().unwrap();
        match &tail.node {
            Expr::BinOp { op, rhs, .. } => {
                assert_eq!(*op, BinOp::Add);
                assert!(matches!(rhs.node, Expr::BinOp { op: BinOp::Mul, .. }));
            }
            other => panic!("expected binop, got {:?}", other),
        }
    }

    #[test]
    fn test_pow_binds_tighter_than_negation() {
        let file = parse("fn f(x) { -x ** 2 }");
        let tail = first_fn(&file).body.node.tail_expr.as_ref().unwrap();
        match &tail.node {
            Expr::Unary { op, operand } => {
                assert_eq!(*op, UnaryOp::Neg);
                assert!(matches!(operand.node, Expr::BinOp { op: BinOp::Pow, .. }));
            }
            other => panic!("expected unary, got {:?}", other),
        }
    }

    #[test]
    fn test_qualified_call_and_path() {
        let file = parse("fn f(x) { math.log(x) + math.pi }");
        let tail = first_fn(&file).body.node.tail_expr.as_ref().unwrap();
        let Expr::BinOp { lhs, rhs, .. } = &tail.node else {
            panic!("expected binop");
        };
        assert!(matches!(&lhs.node, Expr::Call { path, .. } if path.node.is_qualified()));
        assert!(matches!(&rhs.node, Expr::Path(p) if p.as_dotted() == "math.pi"));
    }

    #[test]
    fn test_statements() {
        let source = "fn f(x, win) {
    let result = array.zeros_like(x)
    for i in win..len(x) + 1 {
        result[i - 1] = value(x[i - win..i])
    }
    while false { }
    if win > 1 { return result } else if win == 1 { return x } else { }
    result
}";
        let file = parse(source);
        let body = &first_fn(&file).body.node;
        assert_eq!(body.stmts.len(), 4);
        assert!(matches!(body.stmts[0].node, Stmt::Let { .. }));
        let Stmt::For { body: loop_body, .. } = &body.stmts[1].node else {
            panic!("expected for");
        };
        let Stmt::Assign { place, value } = &loop_body.node.stmts[0].node else {
            panic!("expected assignment");
        };
        assert!(matches!(place.node, Place::Index { .. }));
        let Expr::Call { args, .. } = &value.node else {
            panic!("expected call");
        };
        assert!(matches!(args[0].node, Expr::Slice { .. }));
        assert!(matches!(body.stmts[2].node, Stmt::While { .. }));
        assert!(matches!(body.stmts[3].node, Stmt::If { .. }));
        assert!(body.tail_expr.is_some());
    }

    #[test]
    fn test_tuple_let_and_assign() {
        let file = parse("fn f(x) { let (a, b) = g(x)\n (x[0], _) = g(a)\n b }");
        let body = &first_fn(&file).body.node;
        assert!(matches!(&body.stmts[0].node, Stmt::Let { pattern: Pattern::Tuple(n), .. } if n.len() == 2));
        let Stmt::TupleAssign { places, .. } = &body.stmts[1].node else {
            panic!("expected tuple assignment");
        };
        assert!(matches!(places[0].node, Place::Index { .. }));
        assert_eq!(places[1].node, Place::Discard);
    }

    #[test]
    fn test_invalid_assignment_target() {
        let errs = parse_err("fn f(x) { f(x) = 1 }");
        assert!(errs[0].message.contains("invalid assignment target"));
    }

    #[test]
    fn test_duplicate_parameter() {
        let errs = parse_err("fn f(x, x) { x }");
        assert!(errs[0].message.contains("duplicate parameter"));
    }

    #[test]
    fn test_missing_brace_reports() {
        let errs = parse_err("fn f(x) { x ");
        assert!(!errs.is_empty());
    }

    #[test]
    fn test_semicolons_are_optional_separators() {
        let file = parse("fn f(x) { let a = x; let b = a; b };");
        assert_eq!(first_fn(&file).body.node.stmts.len(), 2);
    }
}
