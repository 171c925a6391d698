use crate::span::Span;
use crate::typeck::DeclId;

/// Handle to an expression allocated in an [`ExprArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExprId(pub u32);

/// Unresolved reference to a name in the enclosing high-level source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentRef {
    pub name: String,
    pub span: Span,
}

/// One `.member` link of a member-access chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberLink {
    /// Location of the period token.
    pub dot_span: Span,
    pub name: String,
    pub name_span: Span,
}

/// A base identifier reference plus zero or more member-access links, the
/// only expression shape inline assembly may embed. Built unresolved; the
/// host type checker binds `binding` (and may attach diagnostics) when it
/// checks the expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainExpr {
    pub base: IdentRef,
    pub members: Vec<MemberLink>,
    pub binding: Option<DeclId>,
}

impl ChainExpr {
    pub fn new(base: IdentRef) -> Self {
        Self {
            base,
            members: Vec::new(),
            binding: None,
        }
    }

    pub fn push_member(&mut self, link: MemberLink) {
        self.members.push(link);
    }

    /// Host source region covered by the whole chain.
    pub fn span(&self) -> Span {
        match self.members.last() {
            Some(last) => self.base.span.to(last.name_span),
            None => self.base.span,
        }
    }

    /// Dotted path text, e.g. `state.flags.carry`.
    pub fn path(&self) -> String {
        let mut path = self.base.name.clone();
        for link in &self.members {
            path.push('.');
            path.push_str(&link.name);
        }
        path
    }
}

/// Allocation arena for the expressions built while one statement is
/// analyzed. The statement-level driver owns it (the expressions become
/// part of the host AST); the bridge only allocates into it and hands out
/// ids.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExprArena {
    exprs: Vec<ChainExpr>,
}

impl ExprArena {
    pub fn alloc(&mut self, expr: ChainExpr) -> ExprId {
        let id = ExprId(self.exprs.len() as u32);
        self.exprs.push(expr);
        id
    }

    pub fn get(&self, id: ExprId) -> &ChainExpr {
        &self.exprs[id.0 as usize]
    }

    pub fn get_mut(&mut self, id: ExprId) -> &mut ChainExpr {
        &mut self.exprs[id.0 as usize]
    }

    pub fn len(&self) -> usize {
        self.exprs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exprs.is_empty()
    }
}
