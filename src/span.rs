/// A byte range in a source file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct Span {
    pub file_id: u16,
    pub start: u32,
    pub end: u32,
}

impl Span {
    pub fn new(file_id: u16, start: u32, end: u32) -> Self {
        Self {
            file_id,
            start,
            end,
        }
    }

    pub fn dummy() -> Self {
        Self {
            file_id: 0,
            start: 0,
            end: 0,
        }
    }

    /// True for spans synthesized without a source location.
    pub fn is_dummy(&self) -> bool {
        self.start == 0 && self.end == 0
    }

    pub fn merge(self, other: Span) -> Span {
        if self.is_dummy() {
            return other;
        }
        if other.is_dummy() {
            return self;
        }
        debug_assert_eq!(self.file_id, other.file_id);
        Span {
            file_id: self.file_id,
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// 1-based line number of the span start within `source`.
    pub fn line(&self, source: &str) -> usize {
        let end = (self.start as usize).min(source.len());
        source.as_bytes()[..end].iter().filter(|&&b| b == b'\n').count() + 1
    }
}

/// A value annotated with its source span.
#[derive(Clone, Debug, PartialEq)]
pub struct Spanned<T> {
    pub node: T,
    pub span: Span,
}

impl<T> Spanned<T> {
    pub fn new(node: T, span: Span) -> Self {
        Self { node, span }
    }

    pub fn dummy(node: T) -> Self {
        Self {
            node,
            span: Span::dummy(),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Spanned<U> {
        Spanned {
            node: f(self.node),
            span: self.span,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_ignores_dummy() {
        let a = Span::new(0, 4, 9);
        assert_eq!(a.merge(Span::dummy()), a);
        assert_eq!(Span::dummy().merge(a), a);
        assert_eq!(a.merge(Span::new(0, 12, 20)), Span::new(0, 4, 20));
    }

    #[test]
    fn test_line_numbers() {
        let src = "fn a() {\n  1\n}\nfn b() {\n}\n";
        assert_eq!(Span::new(0, 0, 2).line(src), 1);
        assert_eq!(Span::new(0, 11, 12).line(src), 2);
        assert_eq!(Span::new(0, 15, 17).line(src), 4);
    }
}
