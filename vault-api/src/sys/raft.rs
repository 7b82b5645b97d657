use super::Sys;
use crate::error::ClientError;
use crate::prelude::debug;
use futures::StreamExt;
use http::Method;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio_util::io::ReaderStream;

const SNAPSHOT_PATH: &str = "sys/storage/raft/snapshot";
const SNAPSHOT_FORCE_PATH: &str = "sys/storage/raft/snapshot-force";

impl Sys<'_> {
    /// Streams a snapshot of the integrated storage into `writer`.
    ///
    /// Returns the number of bytes written. The snapshot is never buffered
    /// whole in memory.
    ///
    /// # Errors
    ///
    /// Any pipeline error, a broken body stream, or a failed write.
    pub async fn raft_snapshot<W>(&self, writer: &mut W) -> Result<u64, ClientError>
    where
        W: AsyncWrite + Unpin,
    {
        let resp = self.send(self.request(Method::GET, SNAPSHOT_PATH)).await?;
        let mut body = std::pin::pin!(resp.bytes_stream());

        let written = self
            .ctx
            .run(async {
                let mut written = 0u64;
                while let Some(chunk) = body.next().await {
                    let chunk = chunk?;
                    writer.write_all(&chunk).await?;
                    written += chunk.len() as u64;
                }
                writer.flush().await?;
                Ok(written)
            })
            .await?;

        debug!("Saved raft snapshot: bytes={written}");
        Ok(written)
    }

    /// Restores integrated storage from a snapshot read from `reader`.
    ///
    /// With `force`, a snapshot taken from a different cluster is accepted.
    /// The body is streamed, so the request is neither retried nor
    /// redirected.
    ///
    /// # Errors
    ///
    /// Any pipeline error.
    pub async fn raft_snapshot_restore<R>(&self, reader: R, force: bool) -> Result<(), ClientError>
    where
        R: AsyncRead + Send + Sync + 'static,
    {
        let path = if force { SNAPSHOT_FORCE_PATH } else { SNAPSHOT_PATH };
        let mut req = self.request(Method::POST, path);
        req.set_body_stream(reqwest::Body::wrap_stream(ReaderStream::new(reader)));
        self.send_discard(req).await
    }
}
