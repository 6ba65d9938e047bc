use crate::peer::PeerStatus;
use tokio::sync::oneshot;

/// Команды от `CallHandle` к задаче сессии звонка.
#[derive(Debug)]
pub(crate) enum SessionCommand {
    Peers { reply: oneshot::Sender<Vec<PeerStatus>> },

    /// Завершить звонок. Ответ приходит после полного закрытия соединений.
    End { reply: oneshot::Sender<()> },
}
