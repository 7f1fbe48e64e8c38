//! device actor
//! each device runs as one task that owns its `AdamDevice`. requests come in over a bounded queue
//! and are answered through oneshot channels, the poll tick is interleaved with them, so at most
//! one register operation per device is ever in flight.

use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::common::error::DeviceError;
use crate::driver::adam::attribute::{AttributeValue, DeviceView};
use crate::driver::adam::device::AdamDevice;
use crate::driver::adam::state::DeviceState;
use crate::driver::adam::variant::Command;
use crate::{debug, info};

const LOG_TAG: &str = "device_thread";
const REQUEST_QUEUE_SIZE: usize = 32;
/// tokio intervals cannot tick with a zero period
pub const MIN_PERIOD: Duration = Duration::from_millis(1);

#[derive(Debug)]
pub enum DeviceRequest {
    Connect(oneshot::Sender<DeviceState>),
    Disconnect(oneshot::Sender<Result<DeviceState, DeviceError>>),
    Poll(oneshot::Sender<DeviceState>),
    Write {
        attribute: String,
        value: AttributeValue,
        reply: oneshot::Sender<Result<(), DeviceError>>,
    },
    Command {
        command: Command,
        channel: i64,
        reply: oneshot::Sender<Result<(), DeviceError>>,
    },
}

/// run until cancelled or every handle is gone, the connection is closed on the way out
pub async fn run_loop(
    mut device: AdamDevice,
    mut request_rx: mpsc::Receiver<DeviceRequest>,
    polling_period: Duration,
    cancel: CancellationToken,
) {
    let polling_period = polling_period.max(MIN_PERIOD);
    let mut ticker = tokio::time::interval(polling_period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    info!(
        LOG_TAG,
        "device worker started, device: {}, polling period: {:?}",
        device.name(),
        polling_period
    );

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!(LOG_TAG, "cancel received, device: {}", device.name());
                break;
            }
            request = request_rx.recv() => match request {
                Some(request) => handle_request(&mut device, request).await,
                None => {
                    info!(LOG_TAG, "request channel closed, device: {}", device.name());
                    break;
                }
            },
            _ = ticker.tick() => {
                device.read_data_from_device().await;
            }
        }
    }
    device.shutdown();
}

async fn handle_request(device: &mut AdamDevice, request: DeviceRequest) {
    debug!(LOG_TAG, "request, device: {}, request: {:?}", device.name(), request);
    // a dropped receiver only means the caller stopped waiting
    match request {
        DeviceRequest::Connect(reply) => {
            let _ = reply.send(device.connect_with_device().await);
        }
        DeviceRequest::Disconnect(reply) => {
            let _ = reply.send(device.disconnect());
        }
        DeviceRequest::Poll(reply) => {
            let _ = reply.send(device.read_data_from_device().await);
        }
        DeviceRequest::Write { attribute, value, reply } => {
            let _ = reply.send(device.write_by_name(&attribute, &value).await);
        }
        DeviceRequest::Command { command, channel, reply } => {
            let _ = reply.send(device.run_command(command, channel).await);
        }
    }
}

/// cloneable front of one device actor
/// reads are served from the shared cache, everything else is queued to the actor
#[derive(Debug, Clone)]
pub struct DeviceHandle {
    name: String,
    request_tx: mpsc::Sender<DeviceRequest>,
    view: DeviceView,
}

impl DeviceHandle {
    pub fn spawn(
        device: AdamDevice,
        polling_period: Duration,
        cancel: CancellationToken,
    ) -> (DeviceHandle, JoinHandle<()>) {
        let (request_tx, request_rx) = mpsc::channel(REQUEST_QUEUE_SIZE);
        let handle = DeviceHandle {
            name: device.name().to_string(),
            request_tx,
            view: device.view(),
        };
        let task = tokio::spawn(run_loop(device, request_rx, polling_period, cancel));
        (handle, task)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn view(&self) -> &DeviceView {
        &self.view
    }

    pub fn state(&self) -> DeviceState {
        self.view.state()
    }

    pub fn read_by_name(&self, name: &str) -> Result<AttributeValue, DeviceError> {
        self.view.read_by_name(name)
    }

    pub async fn connect_with_device(&self) -> Result<DeviceState, DeviceError> {
        self.request(DeviceRequest::Connect).await
    }

    pub async fn disconnect(&self) -> Result<DeviceState, DeviceError> {
        self.request(DeviceRequest::Disconnect).await?
    }

    pub async fn read_data_from_device(&self) -> Result<DeviceState, DeviceError> {
        self.request(DeviceRequest::Poll).await
    }

    pub async fn write_by_name(&self, attribute: &str, value: AttributeValue) -> Result<(), DeviceError> {
        self.request(|reply| DeviceRequest::Write {
            attribute: attribute.to_string(),
            value,
            reply,
        })
        .await?
    }

    pub async fn run_command(&self, command: Command, channel: i64) -> Result<(), DeviceError> {
        self.request(|reply| DeviceRequest::Command { command, channel, reply })
            .await?
    }

    pub async fn reset_hist_max(&self, channel: i64) -> Result<(), DeviceError> {
        self.run_command(Command::ResetHistMax, channel).await
    }

    pub async fn reset_hist_min(&self, channel: i64) -> Result<(), DeviceError> {
        self.run_command(Command::ResetHistMin, channel).await
    }

    pub async fn clear_counter(&self, channel: i64) -> Result<(), DeviceError> {
        self.run_command(Command::ClearCounter, channel).await
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> DeviceRequest,
    ) -> Result<T, DeviceError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let stopped = || DeviceError::ControllerStopped(self.name.clone());
        self.request_tx.send(make(reply_tx)).await.map_err(|_| stopped())?;
        reply_rx.await.map_err(|_| stopped())
    }
}
