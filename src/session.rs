//! Process session
//!
//! A [`Session`] exclusively owns everything attached to one target: the
//! backend handle, the image registry, and the list of active hooks. It is
//! single-threaded and fully synchronous; share it across threads only with
//! external synchronization.

use log::debug;

use crate::error::Result;
use crate::hook::Hook;
use crate::image::ImageRegistry;
use crate::target::TargetProcess;

/// an attached instrumentation session over one target process
pub struct Session<T: TargetProcess> {
    pub(crate) target: T,
    pub(crate) images: ImageRegistry,
    pub(crate) hooks: Vec<Hook>,
}

impl<T: TargetProcess> Session<T> {
    /// attach to a resolved target
    ///
    /// performs the mandatory initial image refresh. on failure no session
    /// exists and `target` is dropped, which releases the OS handle. there
    /// is no observable partially-attached state.
    pub fn attach(target: T) -> Result<Self> {
        let mut images = ImageRegistry::new();
        images.refresh(&target)?;

        debug!(
            "attached to pid {} ({} images)",
            target.pid(),
            images.len()
        );

        Ok(Self {
            target,
            images,
            hooks: Vec::new(),
        })
    }

    /// the underlying target backend
    pub fn target(&self) -> &T {
        &self.target
    }

    /// target process id
    pub fn pid(&self) -> u32 {
        self.target.pid()
    }

    /// the module image registry
    pub fn images(&self) -> &ImageRegistry {
        &self.images
    }

    /// rebuild the image registry from the target's current module list
    pub fn refresh_images(&mut self) -> Result<()> {
        self.images.refresh(&self.target)
    }

    /// re-read a tracked image's current bytes into `dest`
    pub fn read_image(&self, name: &str, dest: &mut Vec<u8>) -> Result<()> {
        self.images.read_image(&self.target, name, dest)
    }

    /// read a single typed value from the target
    pub fn read_value<V: Copy>(&self, address: usize) -> Result<V> {
        self.target.read_value(address)
    }

    /// write a single typed value into the target
    pub fn write_value<V: Copy>(&self, address: usize, value: &V) -> Result<()> {
        self.target.write_value(address, value)
    }

    /// currently active hooks, in installation order
    pub fn hooks(&self) -> &[Hook] {
        &self.hooks
    }

    /// reverse all hooks, then release the target handle
    ///
    /// a removal failure aborts and returns the error; the remaining hooks
    /// stay recorded and `Drop` will retry them best-effort.
    pub fn detach(mut self) -> Result<()> {
        self.remove_all_hooks()
    }
}

impl<T: TargetProcess> Drop for Session<T> {
    fn drop(&mut self) {
        // hooks must not outlive the handle; errors here are unreportable
        let _ = self.remove_all_hooks();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GraftError;
    use crate::target::mock::{FakeProcess, BASE};

    fn target() -> FakeProcess {
        let target = FakeProcess::new();
        target.add_module("app.exe", BASE, 0x1000);
        target
    }

    #[test]
    fn test_attach_refreshes_images() {
        let session = Session::attach(target()).unwrap();
        assert_eq!(session.pid(), 4242);
        assert_eq!(session.images().len(), 1);
        assert!(session.images().contains("app.exe"));
        assert!(session.hooks().is_empty());
    }

    #[test]
    fn test_attach_fails_when_snapshot_fails() {
        let target = target();
        target.fail_snapshot.set(true);
        let result = Session::attach(target);
        assert!(matches!(
            result.err(),
            Some(GraftError::SnapshotFailed { .. })
        ));
    }

    #[test]
    fn test_typed_round_trip_through_session() {
        let session = Session::attach(target()).unwrap();
        session.write_value(BASE + 0x100, &0x1122_3344u32).unwrap();
        assert_eq!(session.read_value::<u32>(BASE + 0x100).unwrap(), 0x1122_3344);
    }

    #[test]
    fn test_drop_removes_remaining_hooks() {
        let target = target();
        let site = BASE + 0x200;
        target.poke(site, &[0x55, 0x8B, 0xEC, 0x83, 0xEC]);

        let scratch;
        {
            let mut session = Session::attach(&target).unwrap();
            session.create_hook(site, 5, &[0x90, 0x90]).unwrap();
            assert_eq!(session.hooks().len(), 1);
            scratch = session.hooks()[0].scratch();
        }

        // drop reversed the hook: original bytes back, scratch page freed
        assert_eq!(target.peek(site, 5), vec![0x55, 0x8B, 0xEC, 0x83, 0xEC]);
        assert_eq!(target.freed.borrow().as_slice(), &[scratch]);
    }

    #[test]
    fn test_detach_removes_hooks() {
        let target = target();
        let site = BASE + 0x300;
        target.poke(site, &[0xCC; 5]);

        let mut session = Session::attach(&target).unwrap();
        session.create_hook(site, 5, &[0x90]).unwrap();
        session.detach().unwrap();

        assert_eq!(target.peek(site, 5), vec![0xCC; 5]);
        assert_eq!(target.freed.borrow().len(), 1);
    }
}
