/// How a failure should be handled by the retry machinery.
///
/// Transient failures go back through the queue's backoff/ceiling policy;
/// permanent ones are terminal immediately and do not consume retry budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Transient,
    Permanent,
}
