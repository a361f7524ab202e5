mod poller;

pub use poller::QueuePoller;
