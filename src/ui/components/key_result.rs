/// What a component did with a key, as seen by the view that owns it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyResult<T> {
  /// Consumed; nothing for the view to do
  Handled,
  /// Consumed, and the view should act on this event
  Event(T),
  /// Not consumed; the view handles the key itself
  NotHandled,
}
