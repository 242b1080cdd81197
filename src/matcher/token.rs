//! Tokens
//!
//! A token is one binding of a production's LHS: an ordered sequence of
//! WMEs, one per positive condition. Tokens are created and owned by the
//! matcher; every other component holds them by `Rc` and compares them by
//! pointer identity, never structurally.

use std::fmt;
use std::rc::Rc;

use crate::wme::{same_wme, Wme};

/// One LHS binding. The WME order follows the positive-condition order of
/// the owning production.
pub struct Token {
    pub wmes: Vec<Rc<Wme>>,
}

impl Token {
    pub fn new(wmes: Vec<Rc<Wme>>) -> Self {
        Token { wmes }
    }

    /// The fuzzy WMEs of this token, in condition order.
    pub fn fuzzy_members(&self) -> impl Iterator<Item = &Rc<Wme>> {
        self.wmes.iter().filter(|w| w.is_fuzzy())
    }

    /// Whether this token holds the given WME (by identity).
    pub fn contains(&self, wme: &Rc<Wme>) -> bool {
        self.wmes.iter().any(|w| same_wme(w, wme))
    }

    /// Structural equality of the underlying WME sequences (used by the
    /// matcher to recognize an already-committed binding; identity of the
    /// token itself stays pointer-based).
    pub fn same_wme_sequence(&self, other: &Token) -> bool {
        self.wmes.len() == other.wmes.len()
            && self
                .wmes
                .iter()
                .zip(other.wmes.iter())
                .all(|(a, b)| same_wme(a, b))
    }
}

/// Pointer identity of a shared token, usable as a map key.
pub fn token_ptr(t: &Rc<Token>) -> usize {
    Rc::as_ptr(t) as usize
}

/// Pointer equality of two shared tokens.
pub fn same_token(a: &Rc<Token>, b: &Rc<Token>) -> bool {
    Rc::ptr_eq(a, b)
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, w) in self.wmes.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{}", w)?;
        }
        write!(f, "]")
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::Interner;

    #[test]
    fn test_token_identity_vs_structure() {
        let mut i = Interner::new();
        let w = Rc::new(Wme::new(i.intern("duck"), i.intern("is-a"), i.intern("bird")));

        let a = Rc::new(Token::new(vec![w.clone()]));
        let b = Rc::new(Token::new(vec![w.clone()]));

        assert!(a.same_wme_sequence(&b));
        assert!(!same_token(&a, &b));
        assert!(same_token(&a, &a.clone()));
    }

    #[test]
    fn test_fuzzy_members() {
        let mut i = Interner::new();
        let crisp = Rc::new(Wme::new(i.intern("B1"), i.intern("is-a"), i.intern("bill")));
        let fuzzy = Rc::new(Wme::fuzzy(
            i.intern("B1"),
            i.intern("food"),
            i.intern("excellent"),
            0.7,
        ));
        let token = Token::new(vec![crisp, fuzzy.clone()]);

        let members: Vec<_> = token.fuzzy_members().collect();
        assert_eq!(members.len(), 1);
        assert!(same_wme(members[0], &fuzzy));
    }

    #[test]
    fn test_contains() {
        let mut i = Interner::new();
        let w1 = Rc::new(Wme::new(i.intern("a"), i.intern("b"), i.intern("c")));
        let w2 = Rc::new(Wme::new(i.intern("x"), i.intern("y"), i.intern("z")));
        let token = Token::new(vec![w1.clone()]);
        assert!(token.contains(&w1));
        assert!(!token.contains(&w2));
    }
}
