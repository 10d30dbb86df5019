/// Asks the operator before a destructive action.
pub trait Confirmation {
    fn confirm(&self, prompt: &str) -> bool;
}

/// An answer that was collected up front, e.g. a `confirm` flag on the request.
#[derive(Debug, Clone, Copy)]
pub struct Decision(pub bool);

impl Confirmation for Decision {
    fn confirm(&self, _prompt: &str) -> bool {
        self.0
    }
}
