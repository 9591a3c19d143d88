use super::exit_codes;
use crate::cli::args::{DbArgs, StatsArgs};
use ci_results_core::aggregate::{build_stats, StatsRequest};
use ci_results_core::storage::Store;

fn open(args: &DbArgs) -> anyhow::Result<Store> {
    let store = Store::open(&args.db)?;
    store.init_schema()?;
    Ok(store)
}

pub async fn cmd_stats(args: StatsArgs) -> anyhow::Result<i32> {
    let req = match StatsRequest::parse(&args.columns, &args.filter, &args.periods, &args.testname)
    {
        Ok(req) => req,
        Err(e) => {
            eprintln!("invalid request: {e}");
            return Ok(exit_codes::CONFIG_ERROR);
        }
    };

    let store = open(&args.db)?;
    let stats = build_stats(&store, &req)?;
    let out = if args.pretty {
        serde_json::to_string_pretty(&stats)?
    } else {
        serde_json::to_string(&stats)?
    };
    println!("{out}");
    Ok(exit_codes::OK)
}

pub async fn cmd_list_tests(args: DbArgs) -> anyhow::Result<i32> {
    let store = open(&args)?;
    println!("{}", serde_json::to_string(&store.list_tests()?)?);
    Ok(exit_codes::OK)
}
