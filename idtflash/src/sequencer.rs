//! Stage 0: upload the loader chain of one chipset.
//!
//! The sequencer checks the manifest, reads every image from disk, and only
//! then opens a session. On the open session it sends the start frame once
//! and uploads `xloader`, `uce` (if the chipset has one) and `fastboot` in
//! that order. Any failure aborts the run; the session is closed on every
//! path. After a successful run the device needs
//! [`ProtocolConfig::post_upload_settle`] to reboot into the fastboot loader
//! before its command channel can be used.

use crate::config::ProtocolConfig;
use crate::error::{Error, Result};
use crate::image::{Image, LoaderDir, Role, RoleTable};
use crate::port::Port;
use crate::session::FlashSession;
use log::{debug, info};
use std::thread;

/// Drives the stage-0 upload for one chipset profile.
#[derive(Debug, Clone)]
pub struct StageSequencer {
    config: ProtocolConfig,
}

impl StageSequencer {
    /// Create a sequencer using `config` for the settle period.
    pub fn new(config: ProtocolConfig) -> Self {
        Self { config }
    }

    /// Protocol configuration in use.
    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    /// Roles to upload, in order, with their addresses.
    ///
    /// Fails with [`Error::MissingRole`] when a mandatory role is absent.
    pub fn plan(table: &RoleTable) -> Result<Vec<(Role, u32)>> {
        let mut plan = Vec::with_capacity(Role::ALL.len());
        for role in Role::ALL {
            match table.get(role) {
                Some(address) => {
                    debug!("{role} address: 0x{address:08X}");
                    plan.push((role, address));
                },
                None if role.is_mandatory() => return Err(Error::MissingRole(role)),
                None => debug!("No {role} stage for this chipset"),
            }
        }
        Ok(plan)
    }

    /// Read the images of `loaders` in upload order.
    pub fn load_images(loaders: &LoaderDir) -> Result<Vec<Image>> {
        let table = loaders.load_manifest()?;
        Self::plan(&table)?
            .into_iter()
            .map(|(role, address)| loaders.load_image(role, address))
            .collect()
    }

    /// Run stage 0 for a chipset directory.
    ///
    /// `connect` is called only after the manifest and all images have been
    /// read successfully. `progress` receives the role being uploaded and
    /// its completed percentage.
    pub fn run<P, C, F>(&self, loaders: &LoaderDir, connect: C, progress: F) -> Result<()>
    where
        P: Port,
        C: FnOnce() -> Result<FlashSession<P>>,
        F: FnMut(Role, u8),
    {
        info!("Uploading images for chipset: {}", loaders.chipset());
        let images = Self::load_images(loaders)?;
        self.upload_all(&images, connect, progress)?;
        self.settle();
        Ok(())
    }

    /// Upload already loaded images over a fresh session.
    ///
    /// The session is closed before this returns. No settle period is
    /// applied.
    pub fn upload_all<P, C, F>(&self, images: &[Image], connect: C, mut progress: F) -> Result<()>
    where
        P: Port,
        C: FnOnce() -> Result<FlashSession<P>>,
        F: FnMut(Role, u8),
    {
        let mut session = connect()?;
        session.send_start_frame()?;

        for image in images {
            info!("Uploading {}...", image.role);
            session.upload_image(image, |percent| progress(image.role, percent))?;
            info!("Uploaded {}", image.role);
        }

        session.close()
    }

    /// Wait for the device to reboot into the fastboot loader.
    pub fn settle(&self) {
        let delay = self.config.post_upload_settle;
        if !delay.is_zero() {
            info!("Waiting {}s for the device to reboot", delay.as_secs_f32());
            thread::sleep(delay);
        }
    }
}
