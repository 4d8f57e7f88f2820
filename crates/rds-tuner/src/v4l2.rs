//! Linux V4L2 radio device backend
//!
//! One [`V4l2Source::open`] call opens the device node read-only and
//! non-blocking. The returned [`RdsStream`] reads RDS records through the
//! tokio reactor; the [`V4l2Tuner`] issues control ioctls on a duplicate of
//! the same descriptor. Both close when dropped.

use std::fs::{File, OpenOptions};
use std::io::{self, Read};
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::task::{ready, Context, Poll};

use nix::fcntl::OFlag;
use tokio::io::unix::AsyncFd;
use tokio::io::{AsyncRead, Interest, ReadBuf};
use tracing::{debug, info};

use crate::{Direction, TunerControl, TunerError, TunerSource};

const V4L2_TUNER_RADIO: u32 = 1;
const V4L2_CAP_RDS_CAPTURE: u32 = 0x0000_0100;
const V4L2_CAP_HW_FREQ_SEEK: u32 = 0x0000_0400;
const V4L2_CAP_TUNER: u32 = 0x0001_0000;

/// `struct v4l2_capability`
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct V4l2Capability {
    pub driver: [u8; 16],
    pub card: [u8; 32],
    pub bus_info: [u8; 32],
    pub version: u32,
    pub capabilities: u32,
    pub device_caps: u32,
    pub reserved: [u32; 3],
}

/// `struct v4l2_tuner`
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct V4l2TunerInfo {
    pub index: u32,
    pub name: [u8; 32],
    pub kind: u32,
    pub capability: u32,
    pub rangelow: u32,
    pub rangehigh: u32,
    pub rxsubchans: u32,
    pub audmode: u32,
    pub signal: i32,
    pub afc: i32,
    pub reserved: [u32; 4],
}

/// `struct v4l2_frequency`
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct V4l2Frequency {
    pub tuner: u32,
    pub kind: u32,
    pub frequency: u32,
    pub reserved: [u32; 8],
}

/// `struct v4l2_hw_freq_seek`
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct V4l2HwFreqSeek {
    pub tuner: u32,
    pub kind: u32,
    pub seek_upward: u32,
    pub wrap_around: u32,
    pub spacing: u32,
    pub rangelow: u32,
    pub rangehigh: u32,
    pub reserved: [u32; 5],
}

nix::ioctl_read!(vidioc_querycap, b'V', 0, V4l2Capability);
nix::ioctl_readwrite!(vidioc_g_tuner, b'V', 29, V4l2TunerInfo);
nix::ioctl_readwrite!(vidioc_g_frequency, b'V', 56, V4l2Frequency);
nix::ioctl_write_ptr!(vidioc_s_frequency, b'V', 57, V4l2Frequency);
nix::ioctl_write_ptr!(vidioc_s_hw_freq_seek, b'V', 82, V4l2HwFreqSeek);

/// Decode a NUL-padded fixed-size C string field
fn c_string(field: &[u8]) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).into_owned()
}

fn query_capability(file: &File) -> Result<V4l2Capability, TunerError> {
    let mut caps = V4l2Capability::default();
    // SAFETY: caps is a properly sized, writable v4l2_capability
    unsafe { vidioc_querycap(file.as_raw_fd(), &mut caps) }.map_err(|source| {
        TunerError::Ioctl {
            request: "VIDIOC_QUERYCAP",
            source,
        }
    })?;
    Ok(caps)
}

/// Opens a V4L2 radio device node for each session
#[derive(Debug, Clone)]
pub struct V4l2Source {
    path: PathBuf,
}

impl V4l2Source {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open_file(&self) -> Result<File, TunerError> {
        OpenOptions::new()
            .read(true)
            .custom_flags(OFlag::O_NONBLOCK.bits())
            .open(&self.path)
            .map_err(|source| TunerError::Open {
                path: self.path.display().to_string(),
                source,
            })
    }
}

impl TunerSource for V4l2Source {
    type Stream = RdsStream;
    type Tuner = V4l2Tuner;

    fn describe(&self) -> String {
        format!("V4L2 device {}", self.path.display())
    }

    fn open(&self) -> Result<(RdsStream, V4l2Tuner), TunerError> {
        let file = self.open_file()?;
        let caps = query_capability(&file)?;

        if caps.capabilities & V4L2_CAP_TUNER == 0 {
            return Err(TunerError::NotATuner(self.path.display().to_string()));
        }

        info!(
            "V4L device {}, driver='{}', card='{}', seek={}, rds={}",
            self.path.display(),
            c_string(&caps.driver),
            c_string(&caps.card),
            caps.capabilities & V4L2_CAP_HW_FREQ_SEEK != 0,
            caps.capabilities & V4L2_CAP_RDS_CAPTURE != 0,
        );

        let control = file.try_clone()?;
        let stream = RdsStream::new(file)?;
        Ok((stream, V4l2Tuner { file: control }))
    }
}

/// Control handle on an open V4L2 radio device
#[derive(Debug)]
pub struct V4l2Tuner {
    file: File,
}

impl V4l2Tuner {
    fn fd(&self) -> i32 {
        self.file.as_raw_fd()
    }
}

impl TunerControl for V4l2Tuner {
    fn frequency(&self) -> Result<u32, TunerError> {
        let mut freq = V4l2Frequency {
            tuner: 0,
            kind: V4L2_TUNER_RADIO,
            ..Default::default()
        };
        // SAFETY: freq is a properly sized, writable v4l2_frequency
        unsafe { vidioc_g_frequency(self.fd(), &mut freq) }.map_err(|source| {
            TunerError::Ioctl {
                request: "VIDIOC_G_FREQUENCY",
                source,
            }
        })?;
        Ok(freq.frequency)
    }

    fn set_frequency(&self, units: u32) -> Result<(), TunerError> {
        let freq = V4l2Frequency {
            tuner: 0,
            kind: V4L2_TUNER_RADIO,
            frequency: units,
            ..Default::default()
        };
        debug!("VIDIOC_S_FREQUENCY {}", units);
        // SAFETY: freq outlives the call and is only read by the driver
        unsafe { vidioc_s_frequency(self.fd(), &freq) }.map_err(|source| {
            TunerError::Ioctl {
                request: "VIDIOC_S_FREQUENCY",
                source,
            }
        })?;
        Ok(())
    }

    fn seek(&self, direction: Direction) -> Result<(), TunerError> {
        let seek = V4l2HwFreqSeek {
            tuner: 0,
            kind: V4L2_TUNER_RADIO,
            seek_upward: u32::from(direction == Direction::Up),
            wrap_around: 1,
            ..Default::default()
        };
        debug!("VIDIOC_S_HW_FREQ_SEEK {}", direction.name());
        // SAFETY: seek outlives the call and is only read by the driver
        unsafe { vidioc_s_hw_freq_seek(self.fd(), &seek) }.map_err(|source| {
            TunerError::Ioctl {
                request: "VIDIOC_S_HW_FREQ_SEEK",
                source,
            }
        })?;
        Ok(())
    }

    fn signal(&self) -> Result<i32, TunerError> {
        let mut tuner = V4l2TunerInfo::default();
        // SAFETY: tuner is a properly sized, writable v4l2_tuner
        unsafe { vidioc_g_tuner(self.fd(), &mut tuner) }.map_err(|source| {
            TunerError::Ioctl {
                request: "VIDIOC_G_TUNER",
                source,
            }
        })?;
        Ok(tuner.signal)
    }

    fn capability_name(&self) -> Result<String, TunerError> {
        query_capability(&self.file).map(|caps| c_string(&caps.card))
    }
}

/// Non-blocking RDS record stream of an open V4L2 radio device
pub struct RdsStream {
    inner: AsyncFd<File>,
}

impl RdsStream {
    /// Register a non-blocking device file with the tokio reactor
    pub fn new(file: File) -> io::Result<Self> {
        // SAFETY: the `File` owns its descriptor and lives inside the
        // `AsyncFd`, so the fd stays open and unchanged until deregistration.
        let inner = unsafe { AsyncFd::register_with_interest(file, Interest::READABLE) }?;
        Ok(Self { inner })
    }
}

impl AsyncRead for RdsStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        loop {
            let mut guard = ready!(self.inner.poll_read_ready(cx))?;
            let unfilled = buf.initialize_unfilled();

            match guard.try_io(|inner| {
                let mut file: &File = inner.get_ref();
                file.read(unfilled)
            }) {
                Ok(Ok(len)) => {
                    buf.advance(len);
                    return Poll::Ready(Ok(()));
                }
                Ok(Err(e)) => return Poll::Ready(Err(e)),
                Err(_would_block) => continue,
            }
        }
    }
}
