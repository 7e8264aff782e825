/// All lexemes of the fastats source language.
#[derive(Clone, Debug, PartialEq)]
pub enum Lexeme {
    // Keywords
    Use,
    Fn,
    Let,
    Const,
    If,
    Else,
    For,
    While,
    In,
    Return,
    True,
    False,

    // Symbols
    LParen, // (
    RParen, // )
    LBrace, // {
    RBrace, // }
    LBracket, // [
    RBracket, // ]
    Comma, // ,
    Semicolon, // ;
    Dot, // .
    DotDot, // ..
    At, // @
    Eq, // =
    EqEq, // ==
    BangEq, // !=
    Bang, // !
    Lt, // <
    LtEq, // <=
    Gt, // >
    GtEq, // >=
    Plus, // +
    Minus, // -
    Star, // *
    StarStar, // **
    Slash, // /
    Percent, // %
    AmpAmp, // &&
    PipePipe, // ||

    // Literals
    Number(f64),
    Ident(String),

    // End of file
    Eof,
}

impl Lexeme {
    /// Try to match an identifier string to a keyword lexeme.
    pub fn from_keyword(s: &str) -> Option<Lexeme> {
        match s {
            "use" => Some(Lexeme::Use),
            "fn" => Some(Lexeme::Fn),
            "let" => Some(Lexeme::Let),
            "const" => Some(Lexeme::Const),
            "if" => Some(Lexeme::If),
            "else" => Some(Lexeme::Else),
            "for" => Some(Lexeme::For),
            "while" => Some(Lexeme::While),
            "in" => Some(Lexeme::In),
            "return" => Some(Lexeme::Return),
            "true" => Some(Lexeme::True),
            "false" => Some(Lexeme::False),
            _ => None,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Lexeme::Use => "'use'",
            Lexeme::Fn => "'fn'",
            Lexeme::Let => "'let'",
            Lexeme::Const => "'const'",
            Lexeme::If => "'if'",
            Lexeme::Else => "'else'",
            Lexeme::For => "'for'",
            Lexeme::While => "'while'",
            Lexeme::In => "'in'",
            Lexeme::Return => "'return'",
            Lexeme::True => "'true'",
            Lexeme::False => "'false'",
            Lexeme::LParen => "'('",
            Lexeme::RParen => "')'",
            Lexeme::LBrace => "'{'",
            Lexeme::RBrace => "'}'",
            Lexeme::LBracket => "'['",
            Lexeme::RBracket => "']'",
            Lexeme::Comma => "','",
            Lexeme::Semicolon => "';'",
            Lexeme::Dot => "'.'",
            Lexeme::DotDot => "'..'",
            Lexeme::At => "'@'",
            Lexeme::Eq => "'='",
            Lexeme::EqEq => "'=='",
            Lexeme::BangEq => "'!='",
            Lexeme::Bang => "'!'",
            Lexeme::Lt => "'<'",
            Lexeme::LtEq => "'<='",
            Lexeme::Gt => "'>'",
            Lexeme::GtEq => "'>='",
            Lexeme::Plus => "'+'",
            Lexeme::Minus => "'-'",
            Lexeme::Star => "'*'",
            Lexeme::StarStar => "'**'",
            Lexeme::Slash => "'/'",
            Lexeme::Percent => "'%'",
            Lexeme::AmpAmp => "'&&'",
            Lexeme::PipePipe => "'||'",
            Lexeme::Number(_) => "number literal",
            Lexeme::Ident(_) => "identifier",
            Lexeme::Eof => "end of file",
        }
    }
}
