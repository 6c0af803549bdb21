/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

/// Translate CRLF line endings on the wire to local line endings.
///
/// A CR at the end of one chunk is held back until the next byte is seen.
pub(crate) struct AsciiDecoder {
    local_crlf: bool,
    pending_cr: bool,
}

impl AsciiDecoder {
    pub(crate) fn new() -> Self {
        AsciiDecoder::with_local_crlf(cfg!(windows))
    }

    pub(crate) fn with_local_crlf(local_crlf: bool) -> Self {
        AsciiDecoder {
            local_crlf,
            pending_cr: false,
        }
    }

    pub(crate) fn decode(&mut self, input: &[u8], out: &mut Vec<u8>) {
        if self.local_crlf {
            out.extend_from_slice(input);
            return;
        }

        out.reserve(input.len() + 1);
        for &b in input {
            if self.pending_cr {
                self.pending_cr = false;
                if b == b'\n' {
                    out.push(b'\n');
                    continue;
                }
                out.push(b'\r');
            }
            if b == b'\r' {
                self.pending_cr = true;
            } else {
                out.push(b);
            }
        }
    }

    /// Flush the held back CR at the end of the stream.
    pub(crate) fn finish(&mut self, out: &mut Vec<u8>) {
        if self.pending_cr {
            self.pending_cr = false;
            out.push(b'\r');
        }
    }
}

/// Translate local line endings to CRLF for the wire.
///
/// A bare LF gets a CR prepended, an existing CRLF is kept as is.
#[derive(Default)]
pub(crate) struct AsciiEncoder {
    last_cr: bool,
}

impl AsciiEncoder {
    pub(crate) fn encode(&mut self, input: &[u8], out: &mut Vec<u8>) {
        out.reserve(input.len() + input.len() / 16);
        for &b in input {
            if b == b'\n' && !self.last_cr {
                out.push(b'\r');
            }
            out.push(b);
            self.last_cr = b == b'\r';
        }
    }
}
