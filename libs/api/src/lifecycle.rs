/// Фаза жизненного цикла процесса. Пишется в лог полем `state`.
///
/// `Connecting → Connected → Running → Closing → Terminated`.
/// Переподключения после `Running` нет.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Connecting,
    Connected,
    Running,
    Closing,
    Terminated,
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            State::Connecting => f.write_str("connecting"),
            State::Connected => f.write_str("connected"),
            State::Running => f.write_str("running"),
            State::Closing => f.write_str("closing"),
            State::Terminated => f.write_str("terminated"),
        }
    }
}
