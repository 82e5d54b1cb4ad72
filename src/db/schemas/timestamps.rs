//! Creation and update timestamps
//!
//! Both collections carry top-level `createdAt` / `updatedAt` fields.

use bson::DateTime;

/// Trait for schemas with system-managed timestamps
pub trait Timestamped {
    fn created_at_mut(&mut self) -> &mut Option<DateTime>;

    fn updated_at_mut(&mut self) -> &mut Option<DateTime>;

    /// Set `updatedAt` to now, and `createdAt` too if it was never set
    fn touch(&mut self) {
        let now = DateTime::now();
        self.created_at_mut().get_or_insert(now);
        *self.updated_at_mut() = Some(now);
    }
}
