//! The top-level configuration function every job starts from.

use crate::accumulator::Accumulator;
use crate::component::ComponentSpec;
use crate::error::Result;
use crate::flags::FlagSource;

pub const NUM_THREADS_FLAG: &str = "Concurrency.NumThreads";
pub const MAX_EVENTS_FLAG: &str = "Exec.MaxEvents";
pub const OUTPUT_LEVEL_FLAG: &str = "Exec.OutputLevel";

/// Core services and application settings, driven by three flags:
/// `Concurrency.NumThreads` selects the serial or the multi-threaded event
/// loop, `Exec.MaxEvents` becomes `EvtMax`, `Exec.OutputLevel` configures
/// the message service.
pub fn base_job(flags: &impl FlagSource) -> Result<Accumulator> {
    let threads = flags.get_int(NUM_THREADS_FLAG)?;
    let max_events = flags.get_int(MAX_EVENTS_FLAG)?;
    let output_level = flags.get_int(OUTPUT_LEVEL_FLAG)?;

    let mut acc = Accumulator::with_origin("base_job");
    acc.add_service(ComponentSpec::service("MessageSvc").with_property("OutputLevel", output_level))?;

    let event_loop = if threads > 0 {
        let scheduler = ComponentSpec::service("AvalancheSchedulerSvc")
            .with_property("ThreadPoolSize", threads);
        let scheduler_name = scheduler.instance_name().to_string();
        acc.add_service(scheduler)?;
        ComponentSpec::service("AthenaHiveEventLoopMgr").with_property("SchedulerSvc", scheduler_name)
    } else {
        ComponentSpec::service("AthenaEventLoopMgr")
    };
    let event_loop_name = event_loop.full_name();
    acc.add_service(event_loop)?;

    acc.set_app_property("EventLoop", event_loop_name)?;
    acc.set_app_property("ThreadPoolSize", threads)?;
    acc.set_app_property("EvtMax", max_events)?;
    tracing::debug!("base job: {} thread(s), EvtMax {}", threads, max_events);
    Ok(acc)
}
