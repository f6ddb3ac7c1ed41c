//! # Relay Commands
//!
//! The closed set of work that crosses the CPU/GPU thread boundary. A command
//! owns its payload, is built without side effects, and is consumed by
//! [`Command::execute`] exactly once.

use std::fmt;

use gpu_relay_shared::{CommandList, FramebufferConfig, Region};

use crate::backend::Backend;

/// One unit of cross-thread GPU work.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// Push a GPFIFO command list and process it.
    SubmitList(CommandList),
    /// Present a frame.
    SwapBuffers(Option<FramebufferConfig>),
    /// Write cached data for a guest region back to memory.
    FlushRegion(Region),
    /// Drop cached data for a guest region.
    InvalidateRegion(Region),
    /// Flush then invalidate a guest region.
    FlushAndInvalidateRegion(Region),
    /// Synchronization marker, executes nothing.
    WaitForIdle,
}

/// Payload-free tag of a [`Command`], for logs and statistics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CommandKind {
    /// [`Command::SubmitList`].
    SubmitList = 0,
    /// [`Command::SwapBuffers`].
    SwapBuffers = 1,
    /// [`Command::FlushRegion`].
    FlushRegion = 2,
    /// [`Command::InvalidateRegion`].
    InvalidateRegion = 3,
    /// [`Command::FlushAndInvalidateRegion`].
    FlushAndInvalidateRegion = 4,
    /// [`Command::WaitForIdle`].
    WaitForIdle = 5,
}

impl CommandKind {
    /// Number of command kinds.
    pub const COUNT: usize = 6;

    /// Stable lowercase name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::SubmitList => "submit_list",
            Self::SwapBuffers => "swap_buffers",
            Self::FlushRegion => "flush_region",
            Self::InvalidateRegion => "invalidate_region",
            Self::FlushAndInvalidateRegion => "flush_and_invalidate_region",
            Self::WaitForIdle => "wait_for_idle",
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Command {
    /// Creates a region flush.
    #[must_use]
    pub const fn flush(addr: u64, size: u64) -> Self {
        Self::FlushRegion(Region::new(addr, size))
    }

    /// Creates a region invalidation.
    #[must_use]
    pub const fn invalidate(addr: u64, size: u64) -> Self {
        Self::InvalidateRegion(Region::new(addr, size))
    }

    /// Creates a region flush-and-invalidate.
    #[must_use]
    pub const fn flush_and_invalidate(addr: u64, size: u64) -> Self {
        Self::FlushAndInvalidateRegion(Region::new(addr, size))
    }

    /// Returns the tag of this command.
    #[must_use]
    pub const fn kind(&self) -> CommandKind {
        match self {
            Self::SubmitList(_) => CommandKind::SubmitList,
            Self::SwapBuffers(_) => CommandKind::SwapBuffers,
            Self::FlushRegion(_) => CommandKind::FlushRegion,
            Self::InvalidateRegion(_) => CommandKind::InvalidateRegion,
            Self::FlushAndInvalidateRegion(_) => CommandKind::FlushAndInvalidateRegion,
            Self::WaitForIdle => CommandKind::WaitForIdle,
        }
    }

    /// Executes the command against the backend, consuming it.
    pub fn execute<B: Backend + ?Sized>(self, backend: &B) {
        match self {
            Self::SubmitList(list) => {
                backend.push_command_list(list);
                backend.dispatch_calls();
            }
            Self::SwapBuffers(framebuffer) => backend.swap_buffers(framebuffer),
            Self::FlushRegion(region) => backend.flush_region(region.addr, region.size),
            Self::InvalidateRegion(region) => backend.invalidate_region(region.addr, region.size),
            Self::FlushAndInvalidateRegion(region) => {
                backend.flush_and_invalidate_region(region.addr, region.size);
            }
            Self::WaitForIdle => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gpu_relay_shared::{CommandListEntry, GuestAddr, PixelFormat};
    use parking_lot::Mutex;

    #[derive(Default)]
    struct CallLog {
        calls: Mutex<Vec<String>>,
    }

    impl CallLog {
        fn push(&self, call: String) {
            self.calls.lock().push(call);
        }
    }

    impl Backend for CallLog {
        fn push_command_list(&self, list: CommandList) {
            self.push(format!("push:{}", list.len()));
        }
        fn dispatch_calls(&self) {
            self.push("dispatch".into());
        }
        fn swap_buffers(&self, framebuffer: Option<FramebufferConfig>) {
            self.push(format!("swap:{}", framebuffer.map_or(0, |fb| fb.width)));
        }
        fn flush_region(&self, addr: GuestAddr, size: u64) {
            self.push(format!("flush:{addr}:{size:#x}"));
        }
        fn invalidate_region(&self, addr: GuestAddr, size: u64) {
            self.push(format!("invalidate:{addr}:{size:#x}"));
        }
        fn flush_and_invalidate_region(&self, addr: GuestAddr, size: u64) {
            self.push(format!("flush_invalidate:{addr}:{size:#x}"));
        }
    }

    #[test]
    fn test_submit_list_pushes_then_dispatches() {
        let log = CallLog::default();
        let list = CommandList::from_entries(vec![CommandListEntry::new(0x1000, 4, false); 3]);
        Command::SubmitList(list).execute(&log);
        assert_eq!(*log.calls.lock(), vec!["push:3", "dispatch"]);
    }

    #[test]
    fn test_every_kind_reaches_backend() {
        let log = CallLog::default();
        let fb = FramebufferConfig::new(0, 1280, 720, PixelFormat::Abgr8);

        Command::SwapBuffers(Some(fb)).execute(&log);
        Command::SwapBuffers(None).execute(&log);
        Command::flush(0x1000, 0x200).execute(&log);
        Command::invalidate(0x2000, 0x10).execute(&log);
        Command::flush_and_invalidate(0x3000, 0x20).execute(&log);
        Command::WaitForIdle.execute(&log);

        assert_eq!(
            *log.calls.lock(),
            vec![
                "swap:1280",
                "swap:0",
                "flush:0x1000:0x200",
                "invalidate:0x2000:0x10",
                "flush_invalidate:0x3000:0x20",
            ]
        );
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(Command::WaitForIdle.kind(), CommandKind::WaitForIdle);
        assert_eq!(Command::flush(0, 0).kind().name(), "flush_region");
        assert_eq!(CommandKind::WaitForIdle as usize, CommandKind::COUNT - 1);
    }
}
