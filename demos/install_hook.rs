//! Install a NOP-shellcode hook at an address, hold it, then remove it.
//!
//!     cargo run --example install_hook -- <pid> <hex address> <size>
//!
//! The patched region must cover whole instructions and be at least the
//! 5 bytes of the entry jump; this demo trusts its operator.

#[cfg(windows)]
fn main() {
    use graft::{Session, WinProcess};

    env_logger::init();

    let mut args = std::env::args().skip(1);
    let (pid, address, size) = match (args.next(), args.next(), args.next()) {
        (Some(pid), Some(address), Some(size)) => {
            let pid: u32 = pid.parse().expect("pid must be numeric");
            let address = usize::from_str_radix(address.trim_start_matches("0x"), 16)
                .expect("address must be hex");
            let size: usize = size.parse().expect("size must be numeric");
            (pid, address, size)
        }
        _ => {
            eprintln!("usage: install_hook <pid> <hex address> <size>");
            std::process::exit(1);
        }
    };

    let target = WinProcess::open_by_pid(pid).unwrap_or_else(|err| {
        eprintln!("failed to open pid {pid}: {err}");
        std::process::exit(1);
    });

    let mut session = Session::attach(target).unwrap_or_else(|err| {
        eprintln!("failed to attach: {err}");
        std::process::exit(1);
    });

    // two NOPs as a do-nothing detour body; control flow still routes
    // through the trampoline and back
    if let Err(err) = session.create_hook(address, size, &[0x90, 0x90]) {
        eprintln!("hook install failed: {err}");
        std::process::exit(1);
    }

    let hook = session.hook_at(address).unwrap();
    println!(
        "hooked {address:#x} ({size} bytes), trampoline at {:#x}; press enter to remove",
        hook.scratch()
    );

    let mut line = String::new();
    let _ = std::io::stdin().read_line(&mut line);

    match session.destroy_hook(address) {
        Ok(()) => println!("hook removed, original bytes restored"),
        Err(err) => eprintln!("hook removal failed, state unknown: {err}"),
    }
}

#[cfg(not(windows))]
fn main() {
    eprintln!("install_hook targets Windows processes only");
}
