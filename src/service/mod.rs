//! CrudService: generic admin CRUD using the safe SQL builder.

mod crud;
mod validation;
pub use crud::{Choice, CrudService, FilterChoices};
pub use validation::{FormMode, RequestValidator};
