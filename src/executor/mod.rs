//! Query execution module
//!
//! This module contains the execution engine and the pieces it drives:
//! value coercion, key constraints, where filtering, results and prepared
//! statements.

pub mod coercion;
pub mod constraints;
pub mod executor;
pub mod filter;
pub mod prepared;
pub mod result;

pub use executor::{ExecutionEngine, Outcome, Query, QueryState};
pub use filter::{Filter, Operator};
pub use prepared::{ParamType, PreparedStatement};
pub use result::{QueryResult, RecordMapping, ResultObject};
