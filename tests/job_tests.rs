use component_accumulator::job::{self, FORMAT_VERSION};
use component_accumulator::{
    Accumulator, ComponentSpec, ConfigError, ConfigFlags, JobConfiguration, ResolvedValue,
    ToolHandle, base_job, materialize,
};
use pretty_assertions::assert_eq;
use tempfile::tempdir;

fn sample_job() -> JobConfiguration {
    let mut acc = Accumulator::new();
    acc.set_app_property("EvtMax", 100).unwrap();
    acc.add_service(
        ComponentSpec::service("CoreDumpSvc")
            .named("CoreDumpSvc")
            .with_property("Signals", vec![11, 15])
            .with_property("FastStackTrace", true),
    )
    .unwrap();
    let public = acc
        .add_public_tool(
            ComponentSpec::public_tool("HelloTool")
                .named("PublicHello")
                .with_property("MyMessage", "A public message!"),
        )
        .unwrap();
    acc.add_event_algo(
        ComponentSpec::event_algorithm("HelloAlg")
            .named("HelloWorld")
            .with_property("MyDouble", 2.5)
            .with_property("MyStringVec", vec!["Welcome", "to", "Athena"])
            .with_property("MyPublicHelloTool", public)
            .with_property(
                "MyPrivateHelloTool",
                ToolHandle::private(
                    ComponentSpec::private_tool("HelloTool")
                        .named("HelloTool")
                        .with_property("MyMessage", "Private"),
                ),
            ),
    )
    .unwrap();
    acc.add_cond_algo(ComponentSpec::conditions_algorithm("HelloCondAlg"))
        .unwrap();
    acc.add_auditor(ComponentSpec::auditor("AlgTimingAuditor"))
        .unwrap();
    materialize(&mut acc).unwrap()
}

#[test]
fn test_json_round_trip() {
    let original = sample_job();
    let text = job::to_json(&original).unwrap();
    let decoded = job::from_json(&text).unwrap();
    assert_eq!(original, decoded);
}

#[test]
fn test_file_round_trip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("job.json");
    let original = sample_job();
    job::write_to(&original, &path).unwrap();
    assert_eq!(job::read_from(&path).unwrap(), original);

    assert!(matches!(
        job::read_from(dir.path().join("missing.json")),
        Err(ConfigError::Io(_))
    ));
}

#[test]
fn test_tampered_job_is_revalidated() {
    let mut tampered = sample_job();
    tampered.public_tools.clear();
    let text = job::to_json(&tampered).unwrap();
    assert!(matches!(
        job::from_json(&text),
        Err(ConfigError::UnresolvedPublicTool { .. })
    ));

    let mut tampered = sample_job();
    let dup = tampered.event_algorithms[0].clone();
    tampered.event_algorithms.push(dup);
    let text = job::to_json(&tampered).unwrap();
    assert!(matches!(
        job::from_json(&text),
        Err(ConfigError::DuplicateInstance { .. })
    ));

    let mut future = sample_job();
    future.format_version = FORMAT_VERSION + 1;
    let text = job::to_json(&future).unwrap();
    assert!(matches!(
        job::from_json(&text),
        Err(ConfigError::UnsupportedFormat { .. })
    ));
}

#[test]
fn test_flattened_properties() {
    let props = sample_job().flatten_properties();
    let value = |component: &str, property: &str| {
        props
            .iter()
            .find(|(c, p, _)| c == component && p == property)
            .map(|(_, _, v)| v.clone())
    };
    assert_eq!(value("CoreDumpSvc", "FastStackTrace").as_deref(), Some("True"));
    assert_eq!(value("CoreDumpSvc", "Signals").as_deref(), Some("[11, 15]"));
    assert_eq!(
        value("HelloWorld", "MyStringVec").as_deref(),
        Some("['Welcome', 'to', 'Athena']")
    );
    assert_eq!(value("HelloWorld", "MyDouble").as_deref(), Some("2.5"));
    assert_eq!(
        value("HelloWorld", "MyPublicHelloTool").as_deref(),
        Some("HelloTool/PublicHello")
    );
    assert_eq!(
        value("HelloWorld.HelloTool", "MyMessage").as_deref(),
        Some("Private")
    );
    assert_eq!(value("ApplicationMgr", "EvtMax").as_deref(), Some("100"));
}

#[test]
fn test_base_job_from_flags_file() {
    let mut flags = ConfigFlags::from_json_str(
        r#"{
            "Concurrency": {"NumThreads": 0},
            "Exec": {"MaxEvents": 10, "OutputLevel": 3}
        }"#,
    )
    .unwrap();
    flags.fill_from_str("Concurrency.NumThreads=8").unwrap();
    flags.lock();

    let mut acc = base_job(&flags).unwrap();
    let job = materialize(&mut acc).unwrap();

    assert_eq!(job.app_properties.get("ThreadPoolSize"), Some(&ResolvedValue::Int(8)));
    assert_eq!(job.app_properties.get("EvtMax"), Some(&ResolvedValue::Int(10)));
    assert_eq!(
        job.app_properties.get("EventLoop"),
        Some(&ResolvedValue::Str(
            "AthenaHiveEventLoopMgr/AthenaHiveEventLoopMgr".to_string()
        ))
    );
    assert_eq!(
        job.service("MessageSvc").and_then(|s| s.property("OutputLevel")),
        Some(&ResolvedValue::Int(3))
    );
}
