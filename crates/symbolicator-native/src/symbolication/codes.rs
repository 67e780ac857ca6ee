//! Static names of signals, signal codes, Mach exceptions and errno values.

/// Signal names by number on Darwin (macOS, iOS and friends).
static DARWIN_SIGNALS: [&str; 32] = [
    "", "SIGHUP", "SIGINT", "SIGQUIT", "SIGILL", "SIGTRAP", "SIGABRT", "SIGEMT", "SIGFPE",
    "SIGKILL", "SIGBUS", "SIGSEGV", "SIGSYS", "SIGPIPE", "SIGALRM", "SIGTERM", "SIGURG",
    "SIGSTOP", "SIGTSTP", "SIGCONT", "SIGCHLD", "SIGTTIN", "SIGTTOU", "SIGIO", "SIGXCPU",
    "SIGXFSZ", "SIGVTALRM", "SIGPROF", "SIGWINCH", "SIGINFO", "SIGUSR1", "SIGUSR2",
];

/// Signal names by number on Linux and Android.
static LINUX_SIGNALS: [&str; 32] = [
    "", "SIGHUP", "SIGINT", "SIGQUIT", "SIGILL", "SIGTRAP", "SIGABRT", "SIGBUS", "SIGFPE",
    "SIGKILL", "SIGUSR1", "SIGSEGV", "SIGUSR2", "SIGPIPE", "SIGALRM", "SIGTERM", "SIGSTKFLT",
    "SIGCHLD", "SIGCONT", "SIGSTOP", "SIGTSTP", "SIGTTIN", "SIGTTOU", "SIGURG", "SIGXCPU",
    "SIGXFSZ", "SIGVTALRM", "SIGPROF", "SIGWINCH", "SIGIO", "SIGPWR", "SIGSYS",
];

/// Signal code names on Darwin, as `(signal, code, name)`.
static DARWIN_SIGNAL_CODES: &[(u32, i64, &str)] = &[
    // SIGILL
    (4, 0, "ILL_NOOP"),
    (4, 1, "ILL_ILLOPC"),
    (4, 2, "ILL_ILLTRP"),
    (4, 3, "ILL_PRVOPC"),
    (4, 4, "ILL_ILLOPN"),
    (4, 5, "ILL_ILLADR"),
    (4, 6, "ILL_PRVREG"),
    (4, 7, "ILL_COPROC"),
    (4, 8, "ILL_BADSTK"),
    // SIGTRAP
    (5, 1, "TRAP_BRKPT"),
    (5, 2, "TRAP_TRACE"),
    // SIGFPE
    (8, 0, "FPE_NOOP"),
    (8, 1, "FPE_FLTDIV"),
    (8, 2, "FPE_FLTOVF"),
    (8, 3, "FPE_FLTUND"),
    (8, 4, "FPE_FLTRES"),
    (8, 5, "FPE_FLTINV"),
    (8, 6, "FPE_FLTSUB"),
    (8, 7, "FPE_INTDIV"),
    (8, 8, "FPE_INTOVF"),
    // SIGBUS
    (10, 0, "BUS_NOOP"),
    (10, 1, "BUS_ADRALN"),
    (10, 2, "BUS_ADRERR"),
    (10, 3, "BUS_OBJERR"),
    // SIGSEGV
    (11, 0, "SEGV_NOOP"),
    (11, 1, "SEGV_MAPERR"),
    (11, 2, "SEGV_ACCERR"),
    // SIGCHLD
    (20, 0, "CLD_NOOP"),
    (20, 1, "CLD_EXITED"),
    (20, 2, "CLD_KILLED"),
    (20, 3, "CLD_DUMPED"),
    (20, 4, "CLD_TRAPPED"),
    (20, 5, "CLD_STOPPED"),
    (20, 6, "CLD_CONTINUED"),
    // SIGIO
    (23, 1, "POLL_IN"),
    (23, 2, "POLL_OUT"),
    (23, 3, "POLL_MSG"),
    (23, 4, "POLL_ERR"),
    (23, 5, "POLL_PRI"),
    (23, 6, "POLL_HUP"),
];

/// Mach exception names by number.
static MACH_EXCEPTIONS: [&str; 14] = [
    "",
    "EXC_BAD_ACCESS",
    "EXC_BAD_INSTRUCTION",
    "EXC_ARITHMETIC",
    "EXC_EMULATION",
    "EXC_SOFTWARE",
    "EXC_BREAKPOINT",
    "EXC_SYSCALL",
    "EXC_MACH_SYSCALL",
    "EXC_RPC_ALERT",
    "EXC_CRASH",
    "EXC_RESOURCE",
    "EXC_GUARD",
    "EXC_CORPSE_NOTIFY",
];

/// errno names by number on Darwin.
static DARWIN_ERRNO: [&str; 82] = [
    "", "EPERM", "ENOENT", "ESRCH", "EINTR", "EIO", "ENXIO", "E2BIG", "ENOEXEC", "EBADF",
    "ECHILD", "EDEADLK", "ENOMEM", "EACCES", "EFAULT", "ENOTBLK", "EBUSY", "EEXIST", "EXDEV",
    "ENODEV", "ENOTDIR", "EISDIR", "EINVAL", "ENFILE", "EMFILE", "ENOTTY", "ETXTBSY", "EFBIG",
    "ENOSPC", "ESPIPE", "EROFS", "EMLINK", "EPIPE", "EDOM", "ERANGE", "EAGAIN", "EINPROGRESS",
    "EALREADY", "ENOTSOCK", "EDESTADDRREQ", "EMSGSIZE", "EPROTOTYPE", "ENOPROTOOPT",
    "EPROTONOSUPPORT", "ESOCKTNOSUPPORT", "ENOTSUP", "EPFNOSUPPORT", "EAFNOSUPPORT",
    "EADDRINUSE", "EADDRNOTAVAIL", "ENETDOWN", "ENETUNREACH", "ENETRESET", "ECONNABORTED",
    "ECONNRESET", "ENOBUFS", "EISCONN", "ENOTCONN", "ESHUTDOWN", "ETOOMANYREFS", "ETIMEDOUT",
    "ECONNREFUSED", "ELOOP", "ENAMETOOLONG", "EHOSTDOWN", "EHOSTUNREACH", "ENOTEMPTY",
    "EPROCLIM", "EUSERS", "EDQUOT", "ESTALE", "EREMOTE", "EBADRPC", "ERPCMISMATCH",
    "EPROGUNAVAIL", "EPROGMISMATCH", "EPROCUNAVAIL", "ENOLCK", "ENOSYS", "EFTYPE", "EAUTH",
    "ENEEDAUTH",
];

/// errno names by number on Linux and Android.
static LINUX_ERRNO: [&str; 41] = [
    "", "EPERM", "ENOENT", "ESRCH", "EINTR", "EIO", "ENXIO", "E2BIG", "ENOEXEC", "EBADF",
    "ECHILD", "EAGAIN", "ENOMEM", "EACCES", "EFAULT", "ENOTBLK", "EBUSY", "EEXIST", "EXDEV",
    "ENODEV", "ENOTDIR", "EISDIR", "EINVAL", "ENFILE", "EMFILE", "ENOTTY", "ETXTBSY", "EFBIG",
    "ENOSPC", "ESPIPE", "EROFS", "EMLINK", "EPIPE", "EDOM", "ERANGE", "EDEADLK",
    "ENAMETOOLONG", "ENOLCK", "ENOSYS", "ENOTEMPTY", "ELOOP",
];

fn lookup<N>(table: &'static [&'static str], number: N) -> Option<&'static str>
where
    N: TryInto<usize>,
{
    let index = number.try_into().ok()?;
    table.get(index).copied().filter(|name| !name.is_empty())
}

/// The operating system whose numbering applies to signals and errno values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OsHint {
    #[default]
    Darwin,
    Linux,
}

impl OsHint {
    pub fn signal_name(self, number: u32) -> Option<&'static str> {
        match self {
            OsHint::Darwin => lookup(&DARWIN_SIGNALS, number),
            OsHint::Linux => lookup(&LINUX_SIGNALS, number),
        }
    }

    /// Names the code of a signal.
    ///
    /// Codes are only known for Darwin numbering.
    pub fn signal_code_name(self, number: u32, code: i64) -> Option<&'static str> {
        match self {
            OsHint::Darwin => DARWIN_SIGNAL_CODES
                .iter()
                .find(|(signal, signal_code, _)| *signal == number && *signal_code == code)
                .map(|(_, _, name)| *name),
            OsHint::Linux => None,
        }
    }

    pub fn errno_name(self, number: i64) -> Option<&'static str> {
        match self {
            OsHint::Darwin => lookup(&DARWIN_ERRNO, number),
            OsHint::Linux => lookup(&LINUX_ERRNO, number),
        }
    }
}

pub fn mach_exception_name(number: u32) -> Option<&'static str> {
    lookup(&MACH_EXCEPTIONS, number)
}
