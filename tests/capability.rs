use effect_memo::{Capability, Effect, Environment, MemoStore, Unscoped, Yes, wrap};

#[derive(Clone, Capability)]
struct Clock {
    now: u64,
}

#[derive(Clone, Capability)]
#[capability(scoped = false)]
struct Config {
    region: &'static str,
}

#[derive(Clone, Capability)]
#[capability(scoped = true)]
struct Connection;

fn assert_unscoped<R: Unscoped>() {}

fn assert_scoped<R: Environment<Scoped = Yes>>() {}

#[test]
fn test_derived_flags() {
    assert_unscoped::<Clock>();
    assert_unscoped::<Config>();
    assert_unscoped::<(Clock, Config)>();
    assert_scoped::<Connection>();
    assert_scoped::<(Clock, Connection)>();
    assert_scoped::<(Config, Clock, Connection)>();
}

#[tokio::test]
async fn test_tuple_environment() {
    let stamp = wrap(&MemoStore::new(), |label: &'static str| {
        Effect::<String, (), (Clock, Config)>::service(move |(clock, config)| {
            format!("{label}@{}:{}", config.region, clock.now)
        })
    });

    let first = stamp.call("build").run((Clock { now: 1 }, Config { region: "eu" })).await;
    let second = stamp.call("build").run((Clock { now: 2 }, Config { region: "us" })).await;
    assert_eq!(first, Ok("build@eu:1".to_string()));
    assert_eq!(second, first);

    let other = stamp.call("test").run((Clock { now: 3 }, Config { region: "us" })).await;
    assert_eq!(other, Ok("test@us:3".to_string()));
}
