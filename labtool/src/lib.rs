//! Administrative task console for lab machines.
//!
//! LabTool drives a fixed set of account and desktop operations, most of
//! them implemented by external PowerShell scripts. The crate is split into:
//!
//! - **[`io`]**: side-effecting plumbing. [`io::invoker::Invoker`] runs a
//!   script and always hands back a populated result, whatever went wrong.
//! - **[`actions`]**: one function per operator action. Actions raise on
//!   failure.
//! - **[`dispatch`]**: the single place action errors are caught, logged
//!   and reported.

pub mod actions;
pub mod dispatch;
pub mod exit_codes;
pub mod io;
pub mod logging;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
