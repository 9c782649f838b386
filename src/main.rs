// flow-loom: headless companion for saved diagram files
// Build with: cargo build --features cli --bin flow-loom

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Arg, ArgMatches, Command};

use flow_loom::graph_utils::graph::GraphDatabase;
use flow_loom::graph_utils::layout::{LayeredLayout, LayoutDirection};
use flow_loom::graph_utils::search::matching_node_ids;
use flow_loom::graph_utils::spatial::{SpatialIndex, VisibleSize};
use flow_loom::persistence::persist::{self, GraphDocument};
use flow_loom::persistence::settings::EditorSettings;

fn cli() -> Command {
    let file = || Arg::new("file").required(true).value_name("FILE").help("Saved graph (.json)");
    Command::new("flow-loom")
        .about("Flow-Loom - validate, lay out, search and snapshot saved diagrams")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(Command::new("validate").about("Load and validate a graph file").arg(file()))
        .subcommand(
            Command::new("layout")
                .about("Run the layered auto-layout and write the result")
                .arg(file())
                .arg(Arg::new("direction").long("direction").value_name("TB|LR").help("Layout direction"))
                .arg(Arg::new("out").long("out").value_name("FILE").help("Output file (default: stdout)")),
        )
        .subcommand(
            Command::new("search")
                .about("List nodes whose name contains the query (case-insensitive)")
                .arg(file())
                .arg(Arg::new("query").required(true)),
        )
        .subcommand(
            Command::new("visible")
                .about("List nodes inside the saved viewport")
                .arg(file())
                .arg(Arg::new("width").long("width").required(true).value_parser(clap::value_parser!(f64)))
                .arg(Arg::new("height").long("height").required(true).value_parser(clap::value_parser!(f64)))
                .arg(Arg::new("overscan").long("overscan").value_parser(clap::value_parser!(f64))),
        )
        .subcommand(Command::new("snapshot").about("Write a timestamped copy to the autosave directory").arg(file()))
        .subcommand(Command::new("versions").about("List snapshots in the autosave directory, newest first"))
}

fn file_arg(m: &ArgMatches) -> PathBuf {
    m.get_one::<String>("file").map(PathBuf::from).unwrap_or_default()
}

fn load(path: &Path) -> anyhow::Result<(GraphDatabase, GraphDocument)> {
    let doc = persist::load_from_path(path).with_context(|| format!("loading {}", path.display()))?;
    let mut db = GraphDatabase::new();
    doc.clone().apply_to(&mut db).with_context(|| format!("validating {}", path.display()))?;
    Ok((db, doc))
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let settings = EditorSettings::load().unwrap_or_else(|e| {
        log::warn!("using default settings: {}", e);
        EditorSettings::default()
    });

    match cli().get_matches().subcommand() {
        Some(("validate", m)) => {
            let (db, _) = load(&file_arg(m))?;
            println!("ok: {} nodes, {} edges", db.node_count(), db.edge_count());
        }
        Some(("layout", m)) => {
            let (mut db, _) = load(&file_arg(m))?;
            let mut config = settings.layout.clone();
            if let Some(dir) = m.get_one::<String>("direction") {
                config.direction = dir.parse::<LayoutDirection>().map_err(anyhow::Error::msg)?;
            }
            db.apply_layout(&config, &LayeredLayout::default());
            let doc = GraphDocument::from_graph(&db);
            match m.get_one::<String>("out") {
                Some(out) => {
                    persist::save_to_path(Path::new(out), &doc)?;
                    eprintln!("wrote {}", out);
                }
                None => println!("{}", doc.to_json()?),
            }
        }
        Some(("search", m)) => {
            let (db, _) = load(&file_arg(m))?;
            let query = m.get_one::<String>("query").map(String::as_str).unwrap_or_default();
            for id in matching_node_ids(db.nodes(), query) {
                let name = db.get_node(&id).map(|n| n.data.name.as_str()).unwrap_or_default();
                println!("{}\t{}", id, name);
            }
        }
        Some(("visible", m)) => {
            let (db, _) = load(&file_arg(m))?;
            let width = m.get_one::<f64>("width").copied().unwrap_or_default();
            let height = m.get_one::<f64>("height").copied().unwrap_or_default();
            let overscan = m.get_one::<f64>("overscan").copied().unwrap_or(settings.overscan);
            let index = SpatialIndex::build(db.nodes(), settings.layout.default_footprint());
            for id in index.query(&db.viewport(), VisibleSize::new(width, height), overscan) {
                println!("{}", id);
            }
        }
        Some(("snapshot", m)) => {
            let (_, doc) = load(&file_arg(m))?;
            let path = persist::save_versioned(&settings.autosave_dir(), &doc)?;
            println!("{}", path.display());
        }
        Some(("versions", _)) => {
            for path in persist::list_versions(&settings.autosave_dir())? {
                println!("{}", path.display());
            }
        }
        _ => anyhow::bail!("no command given; see --help"),
    }
    Ok(())
}
