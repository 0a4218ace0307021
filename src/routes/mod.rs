/// Router Module Index
///
/// Organizes the Route Table by how much a request must prove before it is dispatched.

/// Routes accessible to anyone: greeting, liveness probe, register and login.
pub mod public;

/// Routes that need a verified token but accept every role.
pub mod authenticated;

/// The five entity resources, each method wrapped in the Role Gate with its own role set.
pub mod entities;
