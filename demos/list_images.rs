//! List the image registry of a running process.
//!
//!     cargo run --example list_images -- <pid | process name | window title>

#[cfg(windows)]
fn main() {
    use graft::{Session, WinProcess};

    env_logger::init();

    let identifier = match std::env::args().nth(1) {
        Some(arg) => arg,
        None => {
            eprintln!("usage: list_images <pid | process name | window title>");
            std::process::exit(1);
        }
    };

    let target = match identifier.parse::<u32>() {
        Ok(pid) => WinProcess::open_by_pid(pid),
        Err(_) if identifier.ends_with(".exe") => WinProcess::open_by_name(&identifier),
        Err(_) => WinProcess::open_by_window_title(&identifier),
    };

    let target = match target {
        Ok(target) => target,
        Err(err) => {
            eprintln!("failed to open target: {err}");
            std::process::exit(1);
        }
    };

    let session = match Session::attach(target) {
        Ok(session) => session,
        Err(err) => {
            eprintln!("failed to attach: {err}");
            std::process::exit(1);
        }
    };

    println!("pid {}: {} images", session.pid(), session.images().len());

    let mut names: Vec<&str> = session.images().names().collect();
    names.sort_unstable();

    for name in names {
        let image = session.images().get(name).unwrap();
        println!(
            "  {:#014x}  {:>10} bytes  {}",
            image.base(),
            image.size(),
            name
        );
    }
}

#[cfg(not(windows))]
fn main() {
    eprintln!("list_images targets Windows processes only");
}
