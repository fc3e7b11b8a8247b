use clap::Parser;
use serde_json::Value;
use searchbridge::{
    PredicateSet,
    SearchEngine,
    cli::{self, Cli, Command, IndexAction},
    config::Config,
    error,
    executor,
    record::{self, MemoryRecordSource, Record},
    transport::HttpTransport,
};
use tracing_subscriber::EnvFilter;

fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if let Ok(env) = std::env::var("SEARCHBRIDGE_LOG") {
        EnvFilter::new(env)
    } else if quiet {
        EnvFilter::new("warn")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn main() -> error::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let engine = if cli.command.needs_engine() {
        let config = Config::resolve(cli.config.as_deref())?;
        Some(SearchEngine::from_config(&config)?)
    } else {
        None
    };

    match (cli.command, engine) {
        (Command::Compile(args), _) => cmd_compile(&args)?,
        (Command::Completions(args), _) => args.generate(),
        (Command::Search(args), Some(engine)) => cmd_search(&engine, &args)?,
        (Command::Distinct(args), Some(engine)) => {
            let predicates = PredicateSet::from_json_file(&args.predicates)?;
            for key in engine.distinct(&predicates, &args.field)? {
                println!("{}", record::key_to_string(&key));
            }
        }
        (Command::Index { action }, Some(engine)) => match action {
            IndexAction::Create { name } => {
                print_json(&engine.create_index(&name, &Value::Null)?)?;
            }
            IndexAction::Delete { name } => {
                print_json(&engine.delete_index(&name)?)?;
            }
        },
        (Command::Import(args), Some(engine)) => cmd_import(&engine, &args)?,
        (Command::Remove(args), Some(engine)) => {
            match engine.delete_ids(&args.collection, &args.ids)? {
                Some(_) => println!(
                    "Removed {} document(s) from '{}'",
                    args.ids.len(),
                    args.collection
                ),
                None => println!("Nothing to remove"),
            }
        }
        (Command::Flush { collection }, Some(engine)) => {
            engine.flush(&collection)?;
            println!("Flushed '{collection}'");
        }
        (_, None) => {
            return Err(error::Error::Config(
                "engine client was not configured".into(),
            ));
        }
    }

    Ok(())
}

fn print_json(value: &Value) -> error::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn cmd_compile(args: &cli::CompileArgs) -> error::Result<()> {
    let predicates = PredicateSet::from_json_file(&args.predicates)?;
    let defaults = match args.page {
        Some(page) => executor::paginate_defaults(args.per_page, page),
        None => executor::search_defaults(&predicates),
    };
    let body = executor::build_request(&predicates, defaults);
    print_json(&Value::Object(body))
}

fn cmd_search(
    engine: &SearchEngine<HttpTransport>,
    args: &cli::SearchArgs,
) -> error::Result<()> {
    let predicates = PredicateSet::from_json_file(&args.predicates)?;

    if args.count {
        println!("{}", engine.count(&predicates)?);
        return Ok(());
    }

    let hits = engine.search(&predicates)?;

    if let Some(path) = &args.records {
        let source = MemoryRecordSource::from_json_lines(
            path,
            &predicates.index,
            &args.key,
        )?;
        for record in engine.map(&predicates, hits.as_ref(), &source)? {
            println!("{}", serde_json::to_string(record.fields())?);
        }
        return Ok(());
    }

    if args.json {
        return print_json(hits.as_ref().unwrap_or(&Value::Null));
    }

    let ids = engine.map_ids(hits.as_ref());
    if ids.is_empty() {
        println!("No results found.");
        return Ok(());
    }
    for (rank, id) in ids.iter().enumerate() {
        println!("{:>3}. {id}", rank + 1);
    }
    println!(
        "\n{} hit(s) of {}",
        ids.len(),
        engine.total_count(hits.as_ref())
    );
    Ok(())
}

fn cmd_import(
    engine: &SearchEngine<HttpTransport>,
    args: &cli::ImportArgs,
) -> error::Result<()> {
    let mut records =
        record::read_json_lines(&args.records, &args.collection, &args.key)?;
    if let Some(field) = &args.soft_delete_field {
        records = records
            .into_iter()
            .map(|r| r.soft_deleting(field.as_str()))
            .collect();
    }

    match engine.update(&records)? {
        Some(_) => {
            let indexed = records
                .iter()
                .filter(|r| r.searchable().is_some_and(|doc| !doc.is_empty()))
                .count();
            println!(
                "Indexed {indexed} record(s) into '{}'",
                args.collection
            );
        }
        None => println!("Nothing to index"),
    }
    Ok(())
}
