mod block;
mod manip;

use std::{cell::RefCell, rc::Rc};

pub use block::TokenBlock;
pub use manip::{bunch_from_rows, concat_bunch, pattern_at, push_pattern_at, rows_of};

use crate::{AnnErr, Result};

/// A shared handle to a token, the last holder releases it.
pub type TokenRef = Rc<RefCell<Token>>;

/// The unit of data passed between components.
#[derive(Debug, Clone)]
pub enum Token {
    /// A bunch of vectors stored in a single numeric buffer.
    Block(TokenBlock),
    /// A vector of tokens, no numeric entry point accepts it.
    Vector(Vec<TokenRef>),
}

impl Token {
    /// Returns a human readable name of this token's kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Token::Block(_) => "block",
            Token::Vector(_) => "vector",
        }
    }

    /// Wraps this token into a shared handle.
    pub fn into_ref(self) -> TokenRef {
        Rc::new(RefCell::new(self))
    }

    /// Views this token as a numeric block.
    ///
    /// # Arguments
    /// * `what` - The role of the token, used for the error message.
    ///
    /// # Returns
    /// The inner block or a `WrongTokenKind` error.
    pub fn as_block(&self, what: &'static str) -> Result<&TokenBlock> {
        match self {
            Token::Block(block) => Ok(block),
            other => Err(wrong_kind(what, other)),
        }
    }

    /// Mutable version of `as_block`.
    pub fn as_block_mut(&mut self, what: &'static str) -> Result<&mut TokenBlock> {
        match self {
            Token::Block(block) => Ok(block),
            other => Err(wrong_kind(what, other)),
        }
    }
}

impl From<TokenBlock> for Token {
    fn from(block: TokenBlock) -> Self {
        Token::Block(block)
    }
}

fn wrong_kind(what: &'static str, token: &Token) -> AnnErr {
    AnnErr::WrongTokenKind {
        what,
        expected: "block",
        got: token.kind(),
    }
}
