//! Protocol Module
//!
//! The backend command vocabulary shared by the pipeline and every backend.
//!
//! ## Commands
//! Commands are addressed by name. Names in the [`CommandType`] table get a
//! typed form whose arguments are checked by [`Command::parse`] before
//! anything is queued. Any other name is carried as [`Command::Raw`] with
//! its arguments and keywords intact, for the backend to accept or refuse.
//!
//! ```text
//!   "hget", [key, field]  ──parse──▶  Command::HGet { key, field }
//!   "eval", [script, 1, key, arg]  ──▶  Command::Eval { script, keys, args }
//!   "zpopmin", [key, 2]  ──▶  Command::Raw { name, args, kwargs }
//! ```
//!
//! ## Results
//! Every queued command produces exactly one [`Value`], in queue order.

mod command;
mod value;

pub use command::{key_position, Command, CommandType, Kwargs, ScoreBound};
pub use value::{format_score, Value};
