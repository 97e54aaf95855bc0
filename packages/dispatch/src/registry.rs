//! # ルートレジストリ
//!
//! 起動時に登録されたルートを記録し、診断用の一覧表を出力する。
//! 登録は起動時だけ行われ、リクエスト処理中に参照・変更されることはない。

use std::fmt::Write as _;

use http::Method;

use crate::{error::ConfigurationError, handler::HandlerDescriptor};

/// 登録済みルート 1 件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteEntry {
    pub port:       u16,
    pub method:     Method,
    pub path:       String,
    pub descriptor: HandlerDescriptor,
    /// グローバル → ルート固有の順に並んだミドルウェア名
    pub middleware: Vec<String>,
}

/// ルートレジストリ
#[derive(Debug, Clone, Default)]
pub struct RouteRegistry {
    port:    u16,
    global:  Vec<String>,
    entries: Vec<RouteEntry>,
}

impl RouteRegistry {
    pub fn new<I, N>(port: u16, global_middleware: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<String>,
    {
        Self {
            port,
            global: global_middleware.into_iter().map(Into::into).collect(),
            entries: Vec::new(),
        }
    }

    /// ルートを追加する
    ///
    /// 同じ (method, path) の組は 2 度登録できない。
    pub fn register(
        &mut self,
        method: Method,
        path: &str,
        descriptor: HandlerDescriptor,
        route_middleware: &[&str],
    ) -> Result<&RouteEntry, ConfigurationError> {
        if !path.starts_with('/') {
            return Err(ConfigurationError::InvalidPath {
                path: path.to_owned(),
            });
        }
        if self
            .entries
            .iter()
            .any(|entry| entry.method == method && entry.path == path)
        {
            return Err(ConfigurationError::DuplicateRoute {
                method,
                path: path.to_owned(),
            });
        }

        let middleware = self
            .global
            .iter()
            .cloned()
            .chain(route_middleware.iter().map(|name| (*name).to_owned()))
            .collect();

        self.entries.push(RouteEntry {
            port: self.port,
            method,
            path: path.to_owned(),
            descriptor,
            middleware,
        });

        Ok(&self.entries[self.entries.len() - 1])
    }

    /// 登録順のルート一覧
    pub fn snapshot(&self) -> &[RouteEntry] {
        &self.entries
    }

    pub fn global_middleware(&self) -> &[String] {
        &self.global
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 起動時に表示するルート一覧表
    ///
    /// ```text
    /// +------+--------+---------+---------------------+--------------+-------------------+
    /// | PORT | METHOD | PATH    | HANDLER             | REQUEST      | MIDDLEWARE        |
    /// +------+--------+---------+---------------------+--------------+-------------------+
    /// | 8080 | GET    | /health | handler::health     | bound(Hea..) | request_id, trace |
    /// +------+--------+---------+---------------------+--------------+-------------------+
    /// ```
    pub fn render_table(&self) -> String {
        const HEADER: [&str; 6] = ["PORT", "METHOD", "PATH", "HANDLER", "REQUEST", "MIDDLEWARE"];

        let rows: Vec<[String; 6]> = self
            .entries
            .iter()
            .map(|entry| {
                [
                    entry.port.to_string(),
                    entry.method.to_string(),
                    entry.path.clone(),
                    entry.descriptor.handler_name.to_owned(),
                    entry.descriptor.shape.to_string(),
                    entry.middleware.join(", "),
                ]
            })
            .collect();

        let mut widths = HEADER.map(|title| title.chars().count());
        for row in &rows {
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = (*width).max(cell.chars().count());
            }
        }

        let separator = widths.iter().fold(String::from("+"), |mut line, width| {
            line.push_str(&"-".repeat(width + 2));
            line.push('+');
            line
        });

        let mut table = String::new();
        let _ = writeln!(table, "{separator}");
        push_row(&mut table, &widths, HEADER.iter().copied());
        let _ = writeln!(table, "{separator}");
        for row in &rows {
            push_row(&mut table, &widths, row.iter().map(String::as_str));
            let _ = writeln!(table, "{separator}");
        }
        table
    }
}

fn push_row<'a>(table: &mut String, widths: &[usize], cells: impl Iterator<Item = &'a str>) {
    table.push('|');
    for (cell, width) in cells.zip(widths) {
        let _ = write!(table, " {cell:<width$} |");
    }
    table.push('\n');
}
