mod eval;
mod parse;
mod types;

pub use eval::{compare_bson, compare_docs, eval_filter, project_fields};
pub use parse::parse_filter_json;
pub use types::{CmpOp, Filter, FindOptions, Order, SortSpec};
