pub mod tags {
    /// Tag carrying the job identity on every launched instance.
    pub const JOB_ID: &str = "runway:job-id";
    pub const NAME: &str = "Name";
}

pub mod defaults {
    use std::time::Duration;

    pub const QUIET_PERIOD: Duration = Duration::from_secs(30);
    pub const POLL_INTERVAL: Duration = Duration::from_secs(10);
    pub const READINESS_TIMEOUT: Duration = Duration::from_secs(5 * 60);

    pub const RUNNERS_PER_INSTANCE: u32 = 1;
    pub const STRATEGY: &str = "none";
    pub const RUNNER_USER: &str = "ubuntu";
    pub const RUNNER_HOME: &str = "/home/ubuntu";
}

pub mod market {
    /// Product line spot quotes are restricted to.
    pub const SPOT_PRODUCT: &str = "Linux/UNIX";
    /// Substring identifying bare-metal sizes in a family catalog.
    pub const BARE_METAL: &str = "metal";
}
