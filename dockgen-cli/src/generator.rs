//! Built-in classify/select/render collaborator.
//!
//! This is deliberately dumb: sniff which manifests exist, map that to a
//! fixed project shape, and assemble template text for it. Everything
//! safety-related (traversal, locking, atomic writes) stays in
//! `dockgen-core`; this module only produces strings.

use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use tracing::debug;

use dockgen_core::{safety, Artifact, ArtifactGenerator, ScannedProject};

/// Directories whose manifests never describe the project itself.
const VENDORED_DIRS: &[&str] = &["node_modules", "vendor", "target", "dist", "build", ".git"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProjectShape {
    Node,
    Python,
    Rust,
    Go,
    Java,
    Static,
}

impl ProjectShape {
    fn port(self) -> u16 {
        match self {
            ProjectShape::Node => 3000,
            ProjectShape::Python => 8000,
            ProjectShape::Rust => 8080,
            ProjectShape::Go => 8080,
            ProjectShape::Java => 8080,
            ProjectShape::Static => 80,
        }
    }
}

pub struct BuiltinGenerator {
    gitignore: Gitignore,
}

impl BuiltinGenerator {
    pub fn new(root: &Path) -> Result<Self> {
        let mut builder = GitignoreBuilder::new(root);
        let gitignore_path = root.join(".gitignore");
        if gitignore_path.exists() {
            builder.add(&gitignore_path);
        }
        Ok(Self {
            gitignore: builder.build()?,
        })
    }

    /// A manifest counts only when it sits outside gitignored and
    /// vendored directories; a `package.json` ten levels deep in
    /// `node_modules` says nothing about the project.
    fn is_relevant(&self, path: &Path) -> bool {
        if path.components().any(|c| {
            c.as_os_str()
                .to_str()
                .map(|name| VENDORED_DIRS.contains(&name))
                .unwrap_or(false)
        }) {
            return false;
        }
        !self.gitignore.matched_path_or_any_parents(path, false).is_ignore()
    }

    fn classify(&self, project: &ScannedProject) -> (ProjectShape, String) {
        let mut shape = ProjectShape::Static;
        let mut name = project.root.name.clone();

        let relevant: Vec<_> = project
            .manifests
            .iter()
            .filter(|m| self.is_relevant(&m.path))
            .collect();

        for manifest in &relevant {
            let Some(file_name) = manifest.path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let detected = match file_name {
                "package.json" => Some(ProjectShape::Node),
                "requirements.txt" | "pyproject.toml" => Some(ProjectShape::Python),
                "Cargo.toml" => Some(ProjectShape::Rust),
                "go.mod" => Some(ProjectShape::Go),
                "pom.xml" | "build.gradle" => Some(ProjectShape::Java),
                _ => None,
            };
            let Some(detected) = detected else { continue };

            if detected == ProjectShape::Node {
                if let Some(data) = &manifest.data {
                    if let Some(pkg_name) = data.get("name").and_then(|v| v.as_str()) {
                        name = pkg_name.to_string();
                    }
                }
            }
            debug!(?detected, manifest = %manifest.path.display(), "shape candidate");
            if shape == ProjectShape::Static {
                shape = detected;
            }
        }

        (shape, name)
    }

    fn dockerfile(shape: ProjectShape) -> String {
        let body = match shape {
            ProjectShape::Node => {
                "FROM node:20-alpine\n\
                 WORKDIR /app\n\
                 COPY package*.json ./\n\
                 RUN npm ci --omit=dev\n\
                 COPY . .\n\
                 EXPOSE 3000\n\
                 CMD [\"npm\", \"start\"]\n"
            }
            ProjectShape::Python => {
                "FROM python:3.12-slim\n\
                 WORKDIR /app\n\
                 COPY requirements.txt ./\n\
                 RUN pip install --no-cache-dir -r requirements.txt\n\
                 COPY . .\n\
                 EXPOSE 8000\n\
                 CMD [\"python\", \"main.py\"]\n"
            }
            ProjectShape::Rust => {
                "FROM rust:1.79 AS build\n\
                 WORKDIR /app\n\
                 COPY . .\n\
                 RUN cargo build --release\n\
                 \n\
                 FROM debian:bookworm-slim\n\
                 COPY --from=build /app/target/release/app /usr/local/bin/app\n\
                 EXPOSE 8080\n\
                 CMD [\"app\"]\n"
            }
            ProjectShape::Go => {
                "FROM golang:1.22 AS build\n\
                 WORKDIR /app\n\
                 COPY . .\n\
                 RUN CGO_ENABLED=0 go build -o /out/app .\n\
                 \n\
                 FROM gcr.io/distroless/static\n\
                 COPY --from=build /out/app /app\n\
                 EXPOSE 8080\n\
                 CMD [\"/app\"]\n"
            }
            ProjectShape::Java => {
                "FROM maven:3.9-eclipse-temurin-17 AS build\n\
                 WORKDIR /app\n\
                 COPY pom.xml .\n\
                 RUN mvn dependency:go-offline\n\
                 COPY src ./src\n\
                 RUN mvn clean package -DskipTests\n\
                 \n\
                 FROM eclipse-temurin:17-jre-alpine\n\
                 WORKDIR /app\n\
                 COPY --from=build /app/target/*.jar app.jar\n\
                 EXPOSE 8080\n\
                 CMD [\"java\", \"-jar\", \"app.jar\"]\n"
            }
            ProjectShape::Static => {
                "FROM nginx:alpine\n\
                 COPY . /usr/share/nginx/html\n\
                 EXPOSE 80\n"
            }
        };
        format!("# Generated by dockgen\n{body}")
    }

    fn compose(shape: ProjectShape, name: &str, root: &Path) -> Result<String> {
        let port = shape.port();
        // The host path is embedded in generated text, so it goes
        // through normalize + escape; the filesystem never sees the
        // escaped form.
        let host_path = safety::normalize(root)?;
        let host_path = safety::escape_for_config(&host_path);
        Ok(format!(
            "# Generated by dockgen\n\
             services:\n\
             \x20 {name}:\n\
             \x20   build: .\n\
             \x20   ports:\n\
             \x20     - \"{port}:{port}\"\n\
             \x20   volumes:\n\
             \x20     - {host_path}:/app\n"
        ))
    }
}

#[async_trait]
impl ArtifactGenerator for BuiltinGenerator {
    async fn generate(&self, project: &ScannedProject) -> Result<Vec<Artifact>> {
        let (shape, name) = self.classify(project);
        debug!(?shape, name, "classified project");

        Ok(vec![
            Artifact {
                rel_path: "Dockerfile".to_string(),
                content: Self::dockerfile(shape),
            },
            Artifact {
                rel_path: "docker-compose.yml".to_string(),
                content: Self::compose(shape, &name, &project.root.path)?,
            },
        ])
    }
}
