pub mod display;
pub mod navigate;
pub mod visit;

use crate::span::Spanned;

/// A parsed `.fst` source: an ordered list of items.
///
/// This is also the structural form the specializer works on: a rewritten
/// definition travels as a `File` whose first item is the definition.
#[derive(Clone, Debug, PartialEq)]
pub struct File {
    pub items: Vec<Spanned<Item>>,
}

impl File {
    pub fn functions(&self) -> impl Iterator<Item = &FnDef> {
        self.items.iter().filter_map(|item| match &item.node {
            Item::Fn(func) => Some(func),
            _ => None,
        })
    }
}

/// A dotted module path, e.g. `math.erf` → `["math", "erf"]`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ModulePath(pub Vec<String>);

impl ModulePath {
    pub fn single(name: String) -> Self {
        Self(vec![name])
    }

    pub fn as_dotted(&self) -> String {
        self.0.join(".")
    }

    /// The bare name of an unqualified path, `None` for `module.name` paths.
    pub fn as_single(&self) -> Option<&str> {
        match self.0.as_slice() {
            [name] => Some(name),
            _ => None,
        }
    }

    pub fn is_qualified(&self) -> bool {
        self.0.len() > 1
    }
}

impl std::fmt::Display for ModulePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_dotted())
    }
}

/// Top-level items in a source file.
#[derive(Clone, Debug, PartialEq)]
pub enum Item {
    Use(UseDecl),
    Const(ConstDef),
    Fn(FnDef),
}

/// `use math.erf` binds a library primitive under its last path segment.
#[derive(Clone, Debug, PartialEq)]
pub struct UseDecl {
    pub path: Spanned<ModulePath>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ConstDef {
    pub name: Spanned<String>,
    pub value: Spanned<Expr>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FnDef {
    /// Markers written as `@name` before `fn`. Only `fs` is accepted.
    pub decorators: Vec<Spanned<String>>,
    pub name: Spanned<String>,
    pub params: Vec<Spanned<String>>,
    pub body: Spanned<Block>,
}

impl FnDef {
    pub fn has_decorator(&self, name: &str) -> bool {
        self.decorators.iter().any(|d| d.node == name)
    }
}

/// A block of statements with an optional trailing expression.
#[derive(Clone, Debug, PartialEq)]
pub struct Block {
    pub stmts: Vec<Spanned<Stmt>>,
    pub tail_expr: Option<Box<Spanned<Expr>>>,
}

/// A binding pattern for `let` statements.
#[derive(Clone, Debug, PartialEq)]
pub enum Pattern {
    /// Single name: `let x = ...`
    Name(Spanned<String>),
    /// Tuple destructure: `let (a, b) = ...`
    Tuple(Vec<Spanned<String>>),
}

/// Statements.
#[derive(Clone, Debug, PartialEq)]
pub enum Stmt {
    Let {
        pattern: Pattern,
        init: Spanned<Expr>,
    },
    Assign {
        place: Spanned<Place>,
        value: Spanned<Expr>,
    },
    TupleAssign {
        places: Vec<Spanned<Place>>,
        value: Spanned<Expr>,
    },
    If {
        cond: Spanned<Expr>,
        then_block: Spanned<Block>,
        else_block: Option<Spanned<Block>>,
    },
    For {
        var: Spanned<String>,
        start: Spanned<Expr>,
        end: Spanned<Expr>,
        body: Spanned<Block>,
    },
    While {
        cond: Spanned<Expr>,
        body: Spanned<Block>,
    },
    Expr(Spanned<Expr>),
    Return(Option<Spanned<Expr>>),
}

/// L-value places (can appear on the left side of an assignment).
#[derive(Clone, Debug, PartialEq)]
pub enum Place {
    Var(String),
    /// `_` in a tuple assignment: the value is dropped.
    Discard,
    Index {
        base: Spanned<String>,
        index: Box<Spanned<Expr>>,
    },
}

/// Expressions.
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Literal(Literal),
    Var(String),
    /// Module-qualified constant such as `math.pi`.
    Path(ModulePath),
    BinOp {
        op: BinOp,
        lhs: Box<Spanned<Expr>>,
        rhs: Box<Spanned<Expr>>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Spanned<Expr>>,
    },
    /// `name(args)` when the path has one segment, `module.name(args)`
    /// (attribute-qualified) otherwise.
    Call {
        path: Spanned<ModulePath>,
        args: Vec<Spanned<Expr>>,
    },
    Index {
        expr: Box<Spanned<Expr>>,
        index: Box<Spanned<Expr>>,
    },
    Slice {
        expr: Box<Spanned<Expr>>,
        start: Box<Spanned<Expr>>,
        end: Box<Spanned<Expr>>,
    },
    ArrayInit(Vec<Spanned<Expr>>),
    Tuple(Vec<Spanned<Expr>>),
}

#[derive(Clone, Debug, PartialEq)]
pub enum Literal {
    Number(f64),
    Bool(bool),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinOp {
    Or,  // ||
    And, // &&
    Eq,  // ==
    Ne,  // !=
    Lt,  // <
    Le,  // <=
    Gt,  // >
    Ge,  // >=
    Add, // +
    Sub, // -
    Mul, // *
    Div, // /
    Rem, // %
    Pow, // **
}

impl BinOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            BinOp::Or => "||",
            BinOp::And => "&&",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Rem => "%",
            BinOp::Pow => "**",
        }
    }

    /// Returns (left binding power, right binding power).
    /// Higher binding power = higher precedence.
    pub fn binding_power(&self) -> (u8, u8) {
        match self {
            BinOp::Or => (2, 3),
            BinOp::And => (4, 5),
            BinOp::Eq | BinOp::Ne => (6, 7),
            BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => (8, 9),
            BinOp::Add | BinOp::Sub => (10, 11),
            BinOp::Mul | BinOp::Div | BinOp::Rem => (12, 13),
            // right-associative, binds tighter than unary minus
            BinOp::Pow => (17, 16),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    Neg, // -
    Not, // !
}

impl UnaryOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
            UnaryOp::Not => "!",
        }
    }

    /// Binding power of the operand parsed after a prefix operator.
    pub const BINDING_POWER: u8 = 14;
}
