//! System-wide click watcher.
//!
//! Any pointer button press anywhere on the desktop raises the interrupt token
//! so the bot backs off while the user is at the keyboard. Only X11 is
//! supported; elsewhere the bot runs without click pausing.
use log::{info, warn};
use raidbot_engine::InterruptToken;

/// Start the watcher thread. Returns `false` when click pausing is unavailable.
#[must_use]
pub fn spawn(token: InterruptToken) -> bool {
    #[cfg(target_os = "linux")]
    {
        let watcher = match x11::ClickWatcher::connect() {
            Ok(watcher) => watcher,
            Err(err) => {
                warn!("Click watcher unavailable ({err:#}); click pausing disabled.");
                return false;
            }
        };
        let spawned = std::thread::Builder::new()
            .name("click-watcher".to_string())
            .spawn(move || {
                if let Err(err) = watcher.run(&token) {
                    warn!("Click watcher stopped: {err:#}");
                }
            });
        match spawned {
            Ok(_) => {
                info!("Watching for mouse clicks; any click pauses the bot.");
                true
            }
            Err(err) => {
                warn!("Could not start click watcher thread: {err}");
                false
            }
        }
    }
    #[cfg(not(target_os = "linux"))]
    {
        drop(token);
        warn!("Click watching needs Linux/X11; click pausing disabled.");
        false
    }
}

#[cfg(target_os = "linux")]
mod x11 {
    use anyhow::{Context, bail};
    use raidbot_engine::InterruptToken;
    use x11rb::connection::{Connection, RequestConnection};
    use x11rb::protocol::record::{self, ConnectionExt as _};
    use x11rb::protocol::xproto;
    use x11rb::rust_connection::RustConnection;

    /// Size of a core X event on the wire.
    const EVENT_SIZE: usize = 32;

    pub struct ClickWatcher {
        // the context must be created on a different connection than the one streaming data
        ctrl: RustConnection,
        data: RustConnection,
        context: record::Context,
    }

    impl ClickWatcher {
        pub fn connect() -> anyhow::Result<Self> {
            let (ctrl, _) = x11rb::connect(None).context("cannot open X display")?;
            let (data, _) = x11rb::connect(None).context("cannot open X display")?;
            if ctrl
                .extension_information(record::X11_EXTENSION_NAME)?
                .is_none()
            {
                bail!("X server has no RECORD extension");
            }

            let empty = record::Range8 { first: 0, last: 0 };
            let empty_ext = record::ExtRange {
                major: empty,
                minor: record::Range16 { first: 0, last: 0 },
            };
            let range = record::Range {
                core_requests: empty,
                core_replies: empty,
                ext_requests: empty_ext,
                ext_replies: empty_ext,
                delivered_events: empty,
                device_events: record::Range8 {
                    first: xproto::BUTTON_PRESS_EVENT,
                    last: xproto::BUTTON_PRESS_EVENT,
                },
                errors: empty,
                client_started: false,
                client_died: false,
            };

            let context = ctrl.generate_id()?;
            ctrl.record_create_context(context, 0, &[record::CS::ALL_CLIENTS.into()], &[range])?
                .check()?;
            Ok(Self {
                ctrl,
                data,
                context,
            })
        }

        /// Blocks for as long as the X server keeps the recording alive.
        pub fn run(self, token: &InterruptToken) -> anyhow::Result<()> {
            for reply in self.data.record_enable_context(self.context)? {
                let reply = reply?;
                // category 0 carries intercepted events
                if !reply.client_swapped && reply.category == 0 && has_button_press(&reply.data) {
                    token.raise();
                }
            }
            self.ctrl.record_free_context(self.context)?.check()?;
            Ok(())
        }
    }

    pub fn has_button_press(data: &[u8]) -> bool {
        data.chunks_exact(EVENT_SIZE)
            .any(|event| event[0] & 0x7f == xproto::BUTTON_PRESS_EVENT)
    }

}
