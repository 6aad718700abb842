pub mod document;
pub mod file;
pub mod reconcile;

pub use document::{BudgetSection, ConfigDocument, ProxySection, SecuritySection, ServerSection, ToolsSection};
pub use file::{load, render_template, write};
pub use reconcile::reconcile;
