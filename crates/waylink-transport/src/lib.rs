//! WhatsApp transport for waylink.
//!
//! Wraps `whatsapp-rust` (WhatsApp Web protocol: Noise handshake + Signal
//! encryption) behind the `Transport`/`Messenger` traits. The protocol
//! session is persisted by the library in `{data_dir}/whatsapp_session/`.

mod events;
mod qr;
mod send;
mod session;
mod whatsapp;

pub use qr::render_qr_terminal;
pub use session::FsSessionStore;
pub use whatsapp::WhatsAppTransport;
