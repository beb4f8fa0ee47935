pub mod channel;
pub mod classifier;
pub mod composer;
pub mod dispatcher;
pub mod email;
pub mod sms;
pub mod stats;

pub use channel::{Delivery, DeliveryChannel, DispatchError, SendError};
pub use classifier::{ReceiverClassifier, ReceiverKind};
pub use composer::{ComposedMessage, ImageRef, MessageComposer, FALLBACK_TOKEN};
pub use dispatcher::{Dispatcher, DispatcherBuilder, RetryPolicy};
pub use email::EmailSender;
pub use sms::SmsSender;
pub use stats::{DispatchStats, DispatchStatus};
