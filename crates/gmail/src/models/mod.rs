//! Resource models mirroring the Gmail API JSON shapes

mod attachment;
mod draft;
mod label;
mod message;
mod profile;
mod thread;

pub use attachment::StoredAttachment;
pub use draft::{Draft, DraftInput};
pub use label::{
    Label, LabelColor, LabelInput, LabelListVisibility, LabelType, MessageListVisibility,
    SYSTEM_LABELS, is_system_label, normalize_label,
};
pub use message::{
    Header, Message, MessageFormat, MessageInput, MessagePart, MessagePayload, MessageView,
    PartBody, parse_email_list, normalize_email_list,
};
pub use profile::Profile;
pub use thread::{Thread, ThreadView};
