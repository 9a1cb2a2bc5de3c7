//! rbdmeta CLI
//!
//! Command-line interface for inspecting and editing image metadata held in
//! a file-backed object store.

use clap::{Parser, Subcommand};
use rbdmeta::engine::Engine;
use rbdmeta::storage::FileStore;
use rbdmeta::{Config, Origin, Result, NOSNAP};
use tracing_subscriber::{fmt, EnvFilter};

/// rbdmeta CLI
#[derive(Parser, Debug)]
#[command(name = "rbdmeta-cli")]
#[command(about = "Inspect and edit block-device image metadata")]
#[command(version)]
struct Args {
    /// Data directory of the object store
    #[arg(short, long, default_value = "./rbdmeta_data")]
    data_dir: String,

    /// Backing object to operate on
    #[arg(short, long, default_value = "rbd_header")]
    object: String,

    /// Identity to lock and unlock as
    #[arg(short, long, default_value = "client.admin")]
    identity: String,

    /// Page size for snapshot enumeration
    #[arg(long, default_value = "64")]
    max_keys_read: usize,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a new-format image
    Create {
        /// Image size in bytes
        size: u64,

        /// Data object prefix
        object_prefix: String,

        /// Object size exponent
        #[arg(long, default_value = "22")]
        order: u8,

        /// Feature bits
        #[arg(long, default_value = "0")]
        features: u64,
    },

    /// Show size, features, prefix and snapshot context
    Info,

    /// Resize the image
    Resize {
        /// New size in bytes
        size: u64,
    },

    /// Take a snapshot
    SnapAdd { name: String, id: u64 },

    /// Remove a snapshot by id
    SnapRm { id: u64 },

    /// Print the name of a snapshot
    SnapName { id: u64 },

    /// List snapshots
    SnapLs,

    /// Make the image a clone of a parent snapshot
    SetParent {
        pool: i64,
        image_id: String,
        snap_id: u64,
        size: u64,
    },

    /// Show the parent of the image or of a snapshot
    GetParent {
        /// Snapshot id (the head if omitted)
        #[arg(long)]
        snap: Option<u64>,
    },

    /// Detach the image from its parent
    RemoveParent,

    /// Lock the image
    Lock {
        cookie: String,

        /// Take a shared lock instead of an exclusive one
        #[arg(long)]
        shared: bool,
    },

    /// Release a lock held by --identity
    Unlock { cookie: String },

    /// Release a lock held by anyone
    BreakLock { locker: String, cookie: String },

    /// List lock holders
    Locks,

    /// List old-format snapshots
    LegacySnapLs,

    /// Add an old-format snapshot
    LegacySnapAdd { name: String, id: u64 },

    /// Remove an old-format snapshot
    LegacySnapRm { name: String },

    /// Allocate the next block id from --object
    AssignBid,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,rbdmeta=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = Config::builder()
        .data_dir(&args.data_dir)
        .max_keys_read(args.max_keys_read)
        .build();

    let engine = match Engine::open(config) {
        Ok(engine) => engine,
        Err(e) => {
            tracing::error!("Failed to open store at {}: {}", args.data_dir, e);
            std::process::exit(e.code().abs());
        }
    };

    if let Err(e) = run(&engine, &args) {
        tracing::error!("{}: {}", args.object, e);
        std::process::exit(e.code().abs());
    }
}

fn run(engine: &Engine<FileStore>, args: &Args) -> Result<()> {
    let oid = args.object.as_str();
    let origin = Origin::new(args.identity.as_str());

    match &args.command {
        Commands::Create {
            size,
            object_prefix,
            order,
            features,
        } => {
            engine.create(oid, *size, *order, *features, object_prefix)?;
            println!("created {}", oid);
        }
        Commands::Info => {
            let size = engine.get_size(oid, NOSNAP)?;
            let features = engine.get_features(oid, NOSNAP)?;
            let prefix = engine.get_object_prefix(oid)?;
            let snapc = engine.get_snapcontext(oid)?;

            println!("size: {} bytes", size.size);
            println!("order: {}", size.order);
            println!("features: {:#x}", features.features);
            println!("incompatible features: {:#x}", features.incompatible);
            println!("object prefix: {}", prefix);
            println!("snap_seq: {}", snapc.seq);
            println!("snapshots: {:?}", snapc.snaps);
        }
        Commands::Resize { size } => {
            engine.set_size(oid, *size)?;
            println!("resized {} to {}", oid, size);
        }
        Commands::SnapAdd { name, id } => {
            engine.snapshot_add(oid, name, *id)?;
            println!("added snapshot {} ({})", name, id);
        }
        Commands::SnapRm { id } => {
            engine.snapshot_remove(oid, *id)?;
            println!("removed snapshot {}", id);
        }
        Commands::SnapName { id } => {
            println!("{}", engine.get_snapshot_name(oid, *id)?);
        }
        Commands::SnapLs => {
            for snap in engine.list_snapshots(oid)? {
                println!("{}\t{}\t{}", snap.id, snap.name, snap.image_size);
            }
        }
        Commands::SetParent {
            pool,
            image_id,
            snap_id,
            size,
        } => {
            engine.set_parent(oid, *pool, image_id, *snap_id, *size)?;
            println!("parent set to {}/{}@{}", pool, image_id, snap_id);
        }
        Commands::GetParent { snap } => {
            let parent = engine.get_parent(oid, snap.unwrap_or(NOSNAP))?;
            println!(
                "pool {} image {} snapshot {} overlap {}",
                parent.pool, parent.image_id, parent.snap_id, parent.overlap
            );
        }
        Commands::RemoveParent => {
            engine.remove_parent(oid)?;
            println!("parent removed");
        }
        Commands::Lock { cookie, shared } => {
            if *shared {
                engine.lock_shared(oid, &origin, cookie)?;
            } else {
                engine.lock_exclusive(oid, &origin, cookie)?;
            }
            println!("locked {} as {} ({})", oid, origin, cookie);
        }
        Commands::Unlock { cookie } => {
            engine.unlock_image(oid, &origin, cookie)?;
            println!("unlocked {} ({})", oid, cookie);
        }
        Commands::BreakLock { locker, cookie } => {
            engine.break_lock(oid, locker, cookie)?;
            println!("broke lock {} ({})", locker, cookie);
        }
        Commands::Locks => {
            let locks = engine.list_locks(oid)?;
            if locks.lockers.is_empty() {
                println!("unlocked");
            } else {
                let kind = if locks.exclusive { "exclusive" } else { "shared" };
                println!("{} lock held by:", kind);
                for (entity, cookie) in &locks.lockers {
                    println!("{}\t{}", entity, cookie);
                }
            }
        }
        Commands::LegacySnapLs => {
            let list = engine.snap_list(oid)?;
            println!("snap_seq: {}", list.snap_seq);
            for snap in &list.snaps {
                println!("{}\t{}\t{}", snap.id, snap.name, snap.image_size);
            }
        }
        Commands::LegacySnapAdd { name, id } => {
            engine.snap_add(oid, name, *id)?;
            println!("added snapshot {} ({})", name, id);
        }
        Commands::LegacySnapRm { name } => {
            engine.snap_remove(oid, name)?;
            println!("removed snapshot {}", name);
        }
        Commands::AssignBid => {
            println!("{}", engine.assign_bid(oid)?);
        }
    }

    Ok(())
}
