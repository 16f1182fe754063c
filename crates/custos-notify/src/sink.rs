use crate::protocol::Notification;

/// Receives notifications decoded by the server's reader threads.
///
/// Implementations run on the connection thread that decoded the line, so a
/// slow sink delays later notifications from the same connection.
pub trait NotificationSink: Send + Sync + 'static {
    /// Handles one notification.
    fn deliver(&self, notification: Notification);
}
