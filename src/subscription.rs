/// Handle tying an observer registration to a scope; dropping it
/// unsubscribes.
#[must_use]
pub struct Subscription(Option<Box<dyn FnOnce()>>);

impl Subscription {
    /// Runs `f` when the subscription is dropped.
    pub fn from_fn(f: impl FnOnce() + 'static) -> Self {
        Subscription(Some(Box::new(f)))
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(f) = self.0.take() {
            f();
        }
    }
}
