use clap::{Parser, Subcommand};
use std::io::{self, Write};
use std::path::PathBuf;
use vault_core::{EntryKind, MountManager};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the vault's backing file.
    #[arg(short, long, value_name = "FILE")]
    vault: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a fresh vault and write a single volume into it.
    Init {
        /// Volume id (0..NUM_HEADER_SLOTS), also the header slot it occupies.
        #[arg(long, default_value_t = 0)]
        fsid: u32,
    },
    /// Seed both a real and a decoy volume, then alias the decoy into the
    /// unauthenticated-path slot so mounting without `--kd-ok` only ever
    /// reveals the decoy.
    Bootstrap,
    /// Re-encrypt a header already known this run under a new password,
    /// writing it into another slot (the plausible-deniability primitive).
    Alias {
        #[arg(long)]
        target_slot: usize,
        #[arg(long)]
        write_slot: usize,
    },
    /// Mount a volume and drop into an interactive namespace shell.
    Mount {
        /// Whether the out-of-band authenticator gate passed, allowing slot
        /// 0 (the real volume) to be tried. Without it, slot 0 is skipped.
        #[arg(long)]
        kd_ok: bool,
    },
}

fn prompt_password(label: &str) -> io::Result<String> {
    rpassword::prompt_password(format!("{label}: "))
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    if let Err(e) = run(args) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn run(args: Args) -> vault_core::Result<()> {
    let mut manager = MountManager::open(&args.vault)?;

    match args.command {
        Command::Init { fsid } => {
            let fresh = std::fs::metadata(&args.vault).map(|m| m.len() == 0).unwrap_or(true);
            if fresh {
                manager.seed_slot_noise()?;
            }
            let password = prompt_password("Volume password")?;
            let (slot, fsid) = manager.create_volume(&password, fsid)?;
            println!("created volume fsid={fsid} in slot {slot}");
        }
        Command::Bootstrap => {
            manager.seed_slot_noise()?;
            let real_password = prompt_password("Real volume password")?;
            let decoy_password = prompt_password("Decoy volume password")?;
            manager.create_volume(&real_password, 0)?;
            manager.create_volume(&decoy_password, 1)?;
            manager.alias_slot(1, &real_password, 2)?;
            println!("bootstrap complete: real=slot 0, decoy=slot 1, decoy-under-real-password=slot 2");
        }
        Command::Alias { target_slot, write_slot } => {
            let new_password = prompt_password("New password for this slot")?;
            manager.alias_slot(target_slot, &new_password, write_slot)?;
            println!("slot {target_slot} aliased into slot {write_slot}");
        }
        Command::Mount { kd_ok } => {
            let password = prompt_password("Password")?;
            let (slot, fsid) = manager.mount(&password, kd_ok)?;
            println!("mounted slot {slot} (fsid {fsid})");
            run_shell(&mut manager)?;
        }
    }
    Ok(())
}

/// Minimal line-oriented dispatcher over a mounted namespace. Each line is
/// one command; blank input and EOF both exit cleanly.
fn run_shell(manager: &mut MountManager) -> vault_core::Result<()> {
    let stdin = io::stdin();
    loop {
        print!("{} > ", manager.current_path()?);
        io::stdout().flush().ok();

        let mut line = String::new();
        if stdin.read_line(&mut line).unwrap_or(0) == 0 {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let mut parts = line.splitn(2, char::is_whitespace);
        let cmd = parts.next().unwrap_or("");
        let rest = parts.next().unwrap_or("").trim();

        if let Err(e) = dispatch(manager, cmd, rest) {
            println!("error: {e}");
        }
        if cmd == "quit" || cmd == "exit" {
            break;
        }
    }
    Ok(())
}

/// Splits `<name> <data words...>` and rejoins the data words with single
/// spaces, collapsing whatever whitespace run separated them on the line.
fn split_name_and_data(arg: &str) -> (&str, String) {
    let mut words = arg.split_whitespace();
    let name = words.next().unwrap_or("");
    let data = words.collect::<Vec<_>>().join(" ");
    (name, data)
}

fn dispatch(manager: &mut MountManager, cmd: &str, arg: &str) -> vault_core::Result<()> {
    match cmd {
        "ls" | "dir" => {
            for entry in manager.list()? {
                let marker = if entry.kind == EntryKind::Directory { "/" } else { "" };
                println!("{}{}", entry.name, marker);
            }
        }
        "tree" => {
            for (depth, entry) in manager.tree()? {
                let marker = if entry.kind == EntryKind::Directory { "/" } else { "" };
                println!("{}{}{}", "  ".repeat(depth), entry.name, marker);
            }
        }
        "cd" | "chdir" => manager.chdir(arg)?,
        "mkdir" => manager.mkdir(arg)?,
        "rmdir" => manager.rmdir(arg)?,
        "touch" | "create" => manager.create(arg)?,
        "write" => {
            let (name, data) = split_name_and_data(arg);
            manager.write(name, data.into_bytes())?;
        }
        "append" => {
            let (name, data) = split_name_and_data(arg);
            manager.append(name, data.into_bytes())?;
        }
        "cat" | "read" => {
            let data = manager.read(arg)?;
            println!("{}", String::from_utf8_lossy(&data));
        }
        "rm" | "del" => manager.rm(arg)?,
        "quit" | "exit" => {}
        other => println!("Unknown command: {other}"),
    }
    Ok(())
}
