use log::trace;

/// Which side of a `MirroredBuffer` holds the authoritative data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coherence {
    HostOwns,
    DeviceOwns,
    Synced,
}

/// A numeric array with an optional accelerator resident copy.
///
/// Every view borrows the buffer mutably, so at most one view (host or device) can be alive at
/// any time and the stale side is always refreshed before a view is handed out. The device
/// mirror is allocated lazily, the first time a device view is requested.
#[derive(Debug, Clone)]
pub struct MirroredBuffer {
    host: Vec<f32>,
    device: Option<Vec<f32>>,
    state: Coherence,
}

impl MirroredBuffer {
    /// Creates a new zeroed `MirroredBuffer`.
    ///
    /// # Arguments
    /// * `len` - The amount of scalars in the buffer.
    ///
    /// # Returns
    /// A new host owned buffer.
    pub fn new(len: usize) -> Self {
        Self::from_vec(vec![0.; len])
    }

    /// Creates a new host owned `MirroredBuffer` from the given data.
    pub fn from_vec(host: Vec<f32>) -> Self {
        Self {
            host,
            device: None,
            state: Coherence::HostOwns,
        }
    }

    pub fn len(&self) -> usize {
        self.host.len()
    }

    pub fn is_empty(&self) -> bool {
        self.host.is_empty()
    }

    pub fn coherence(&self) -> Coherence {
        self.state
    }

    /// Returns whether the device mirror has been allocated.
    pub fn has_device(&self) -> bool {
        self.device.is_some()
    }

    /// Gives a read only view of the most current data on the host side.
    pub fn read(&mut self) -> &[f32] {
        self.sync_host();
        &self.host
    }

    /// Gives a mutable view of the host side, the host becomes the owner of the data.
    pub fn read_write(&mut self) -> &mut [f32] {
        self.sync_host();
        self.state = Coherence::HostOwns;
        &mut self.host
    }

    /// Gives a write only view of the host side, the current contents of the device are dropped.
    pub fn write(&mut self) -> &mut [f32] {
        self.state = Coherence::HostOwns;
        &mut self.host
    }

    /// Gives a read only view of the most current data on the device side.
    pub fn device_read(&mut self) -> &[f32] {
        self.sync_device();
        self.device_mirror()
    }

    /// Gives a mutable view of the device side, the device becomes the owner of the data.
    pub fn device_read_write(&mut self) -> &mut [f32] {
        self.sync_device();
        self.state = Coherence::DeviceOwns;
        self.device_mirror()
    }

    /// Gives a write only view of the device side, the current contents of the host are dropped.
    pub fn device_write(&mut self) -> &mut [f32] {
        self.state = Coherence::DeviceOwns;
        self.device_mirror()
    }

    /// Gives a read only view of the side selected by `use_device`.
    pub fn view(&mut self, use_device: bool) -> &[f32] {
        if use_device {
            self.device_read()
        } else {
            self.read()
        }
    }

    /// Gives a mutable view of the side selected by `use_device`.
    pub fn view_mut(&mut self, use_device: bool) -> &mut [f32] {
        if use_device {
            self.device_read_write()
        } else {
            self.read_write()
        }
    }

    /// Resizes the buffer, new positions are zeroed.
    ///
    /// The data is resolved into the host first and the device mirror is released.
    pub fn resize(&mut self, len: usize) {
        self.sync_host();
        self.host.resize(len, 0.);
        self.device = None;
        self.state = Coherence::HostOwns;
    }

    fn device_mirror(&mut self) -> &mut [f32] {
        let len = self.host.len();
        self.device.get_or_insert_with(|| vec![0.; len])
    }

    fn sync_host(&mut self) {
        if self.state != Coherence::DeviceOwns {
            return;
        }

        if let Some(device) = &self.device {
            trace!("pulling {} scalars from device", device.len());
            self.host.copy_from_slice(device);
        }

        self.state = Coherence::Synced;
    }

    fn sync_device(&mut self) {
        let Some(device) = self.device.as_mut() else {
            trace!("allocating device mirror of {} scalars", self.host.len());
            self.device = Some(self.host.clone());
            self.state = Coherence::Synced;
            return;
        };

        if self.state == Coherence::HostOwns {
            trace!("pushing {} scalars to device", self.host.len());
            device.copy_from_slice(&self.host);
            self.state = Coherence::Synced;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_buffer_is_host_owned() {
        let buf = MirroredBuffer::new(4);
        assert_eq!(buf.len(), 4);
        assert_eq!(buf.coherence(), Coherence::HostOwns);
        assert!(!buf.has_device());
    }

    #[test]
    fn test_device_view_pulls_host_data() {
        let mut buf = MirroredBuffer::from_vec(vec![1., 2., 3.]);
        assert_eq!(buf.device_read(), &[1., 2., 3.]);
        assert_eq!(buf.coherence(), Coherence::Synced);
    }

    #[test]
    fn test_host_read_resolves_device_writes() {
        let mut buf = MirroredBuffer::from_vec(vec![1., 2., 3.]);
        buf.device_read_write()[1] = 7.;
        assert_eq!(buf.coherence(), Coherence::DeviceOwns);

        assert_eq!(buf.read(), &[1., 7., 3.]);
        assert_eq!(buf.coherence(), Coherence::Synced);
    }

    #[test]
    fn test_device_read_resolves_host_writes() {
        let mut buf = MirroredBuffer::from_vec(vec![0.; 3]);
        buf.device_read();
        buf.read_write()[0] = 5.;
        assert_eq!(buf.coherence(), Coherence::HostOwns);

        assert_eq!(buf.device_read(), &[5., 0., 0.]);
    }

    #[test]
    fn test_write_only_views_skip_the_pull() {
        let mut buf = MirroredBuffer::from_vec(vec![1., 1.]);
        buf.device_write().copy_from_slice(&[2., 2.]);
        buf.write().copy_from_slice(&[3., 3.]);

        assert_eq!(buf.device_read(), &[3., 3.]);
    }

    #[test]
    fn test_resize_keeps_device_data() {
        let mut buf = MirroredBuffer::from_vec(vec![1., 2.]);
        buf.device_read_write()[0] = 9.;
        buf.resize(3);

        assert!(!buf.has_device());
        assert_eq!(buf.read(), &[9., 2., 0.]);
    }
}
