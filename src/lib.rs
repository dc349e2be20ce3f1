#![doc = include_str!("../readme.md")]

pub mod classify;
pub mod route;
pub mod token;
mod parser;
mod util;

pub use classify::{BaseKind, SubKind};
pub use parser::parse_f15;
pub use route::{Diagnostic, ExtractedRouteSequence, RouteElement, Rules, Span};
pub use token::{tokenize, Token, TokenStream};
