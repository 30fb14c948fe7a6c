pub mod ast;
pub mod compiler;
pub mod error;
pub mod group;
pub mod ir;
pub mod parser;
pub mod types;


pub use compiler::Prelude;
pub use error::{IrError, IrErrorKind, IrResult, Location};
pub use parser::{parse_program, parse_query};
pub use types::{check_compatible, group_of, require_group, Type, TypeCatalog, TypeKind};
